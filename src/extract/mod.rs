//! Field extraction: turns a document and a field list into a composite key.

use crate::types::{CompositeKey, Document, Value};

/// Builds the composite key of a document for a list of field names.
///
/// Implementations must be pure: the same logical field values always give
/// the same key, whatever document instance they come from.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, document: &Document, fields: &[String]) -> CompositeKey;
}

/// Default extractor: each field name is a dotted path. A missing field
/// becomes `Value::Null`, so a document without the field and a document
/// with an explicit null share a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathExtractor;

impl FieldExtractor for PathExtractor {
    fn extract(&self, document: &Document, fields: &[String]) -> CompositeKey {
        fields
            .iter()
            .map(|field| document.get_path(field).cloned().unwrap_or(Value::Null))
            .collect::<Vec<_>>()
            .into()
    }
}
