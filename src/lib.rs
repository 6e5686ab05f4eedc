//! docindex: composite-key secondary indexes for in-memory document collections.
//!
//! An [`Index`] maps the key extracted from one or more document fields to
//! the documents sharing it, with an optional uniqueness constraint, atomic
//! updates, exact-key lookups and predicate-filtered full scans.

pub mod cli;
pub mod config;
pub mod extract;
pub mod index;
pub mod query;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{IndexConfig, IndexDefinition};
pub use extract::{FieldExtractor, PathExtractor};
pub use index::{Documents, Index, IndexStats, UpdateMode};
pub use query::{ExpressionParser, Filter, QueryCompiler};
pub use types::{CompositeKey, Document, IndexError, IndexResult, Value};
