//! Query compilation: turns a query document into a document predicate.

pub mod expression;

pub use expression::{Condition, Expression, ExpressionParser};

use crate::types::{Document, IndexResult};

/// A compiled predicate over documents.
pub type Filter = Box<dyn Fn(&Document) -> bool + Send + Sync>;

/// Compiles query documents into predicates. Stateless and reusable.
pub trait QueryCompiler: Send + Sync {
    fn compile(&self, query: &Document) -> IndexResult<Filter>;
}
