//! Error types for the docindex library.

use thiserror::Error;

use super::CompositeKey;

/// All errors that can occur in the docindex library.
///
/// Uniqueness violations are normally reported as data by the index
/// operations; `DuplicateKey` exists for callers that want to turn such a
/// report into a hard failure (see [`crate::index::Index::into_violation`]).
#[derive(Error, Debug)]
pub enum IndexError {
    /// An index needs at least one field to form a key.
    #[error("Index '{0}' must declare at least one field")]
    EmptyFields(String),

    /// A unique index already holds a document for this key.
    #[error("Duplicate key in unique index '{index}': {key}")]
    DuplicateKey { index: String, key: CompositeKey },

    /// The query document could not be compiled into a predicate.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid index configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A document was not a JSON object.
    #[error("Expected a JSON object, got: {0}")]
    NotADocument(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Convenience result type for docindex operations.
pub type IndexResult<T> = Result<T, IndexError>;
