//! Index definitions with TOML persistence.
//!
//! ```toml
//! [[index]]
//! name = "email_1"
//! fields = ["email"]
//! unique = true
//!
//! [[index]]
//! name = "status_1"
//! fields = ["status"]
//! update_mode = "remove_then_insert"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::index::{Index, UpdateMode};
use crate::types::{IndexError, IndexResult};

/// One index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique within its owner.
    pub name: String,

    /// Indexed fields (dotted paths), in key order.
    pub fields: Vec<String>,

    /// Reject a second document with the same key.
    #[serde(default)]
    pub unique: bool,

    /// How updates replace the previous version of a document.
    #[serde(default)]
    pub update_mode: UpdateMode,
}

impl IndexDefinition {
    pub fn new<I>(name: impl Into<String>, fields: I, unique: bool) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            unique,
            update_mode: UpdateMode::default(),
        }
    }
}

/// The set of indexes defined for a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default, rename = "index")]
    pub indexes: Vec<IndexDefinition>,
}

impl IndexConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> IndexResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file
    pub fn load(path: &Path) -> IndexResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save to TOML file
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> IndexResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject empty field lists and duplicate index names.
    pub fn validate(&self) -> IndexResult<()> {
        let mut names = HashSet::new();
        for def in &self.indexes {
            if def.fields.is_empty() {
                return Err(IndexError::Config(format!(
                    "index '{}' has no fields",
                    def.name
                )));
            }
            if !names.insert(def.name.as_str()) {
                return Err(IndexError::Config(format!(
                    "duplicate index name '{}'",
                    def.name
                )));
            }
        }
        Ok(())
    }

    /// Build one empty index per definition, in definition order.
    pub fn build_indexes(&self) -> IndexResult<Vec<Index>> {
        self.validate()?;
        self.indexes.iter().map(Index::from_definition).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[index]]
name = "email_1"
fields = ["email"]
unique = true

[[index]]
name = "status_1"
fields = ["status", "owner.id"]
update_mode = "remove_then_insert"
"#;

    #[test]
    fn test_parse_sample() {
        let config = IndexConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.indexes.len(), 2);
        assert!(config.indexes[0].unique);
        assert_eq!(config.indexes[0].update_mode, UpdateMode::Atomic);
        assert!(!config.indexes[1].unique);
        assert_eq!(config.indexes[1].update_mode, UpdateMode::RemoveThenInsert);
        assert_eq!(config.indexes[1].fields, vec!["status", "owner.id"]);
    }

    #[test]
    fn test_empty_config() {
        let config = IndexConfig::from_toml_str("").unwrap();
        assert!(config.indexes.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let config = IndexConfig {
            indexes: vec![
                IndexDefinition::new("a", ["x"], false),
                IndexDefinition::new("a", ["y"], false),
            ],
        };
        assert!(matches!(config.validate(), Err(IndexError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_fields() {
        let toml = "[[index]]\nname = \"bad\"\nfields = []\n";
        assert!(matches!(
            IndexConfig::from_toml_str(toml),
            Err(IndexError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexes.toml");
        let config = IndexConfig::from_toml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();
        assert_eq!(IndexConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_build_indexes() {
        let indexes = IndexConfig::from_toml_str(SAMPLE)
            .unwrap()
            .build_indexes()
            .unwrap();
        assert_eq!(indexes[0].name(), "email_1");
        assert!(indexes[0].is_unique());
        assert_eq!(indexes[1].update_mode(), UpdateMode::RemoveThenInsert);
    }
}
