//! All data types for the docindex library.

pub mod document;
pub mod error;
pub mod key;
pub mod value;

pub use document::Document;
pub use error::{IndexError, IndexResult};
pub use key::CompositeKey;
pub use value::Value;

/// Separator between path segments in a dotted field name.
pub const PATH_SEPARATOR: char = '.';

/// Name of the identifier field, used by the CLI to label documents.
pub const ID_FIELD: &str = "_id";
