//! CLI command implementations.

use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::IndexConfig;
use crate::index::Index;
use crate::types::{CompositeKey, Document, IndexError, IndexResult, ID_FIELD};

/// Indexes loaded from a config file and a document file.
pub struct LoadedIndexes {
    pub indexes: Vec<Index>,
    /// First uniqueness violation hit by each index that had one.
    pub conflicts: Vec<(String, CompositeKey)>,
    pub document_count: usize,
}

impl LoadedIndexes {
    /// Find an index by name.
    pub fn find(&self, name: &str) -> IndexResult<&Index> {
        self.indexes
            .iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| IndexError::Config(format!("no index named '{}'", name)))
    }
}

/// Read one JSON document per line. Blank lines are skipped.
pub fn read_documents(path: &Path) -> IndexResult<Vec<Document>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut documents = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        documents.push(Document::parse(line)?);
    }
    Ok(documents)
}

/// Build every configured index and bulk-load the documents into it.
pub fn load_indexes(config_path: &Path, documents_path: &Path) -> IndexResult<LoadedIndexes> {
    let config = IndexConfig::load(config_path)?;
    let documents = read_documents(documents_path)?;
    let indexes = config.build_indexes()?;

    let mut conflicts = Vec::new();
    for index in &indexes {
        if let Some(key) = index.add_all(&documents).into_iter().next() {
            log::warn!("Index '{}' rejected duplicate key {}", index.name(), key);
            conflicts.push((index.name().to_string(), key));
        }
    }

    Ok(LoadedIndexes {
        indexes,
        conflicts,
        document_count: documents.len(),
    })
}

/// Load all indexes and report their statistics. Fails with the first
/// uniqueness violation after printing the report.
pub fn cmd_build(config: &Path, documents: &Path, json: bool) -> IndexResult<()> {
    let loaded = load_indexes(config, documents)?;
    let stats: Vec<_> = loaded.indexes.iter().map(Index::stats).collect();

    if json {
        let report = serde_json::json!({
            "documents": loaded.document_count,
            "indexes": stats,
            "conflicts": loaded.conflicts.iter().map(|(index, key)| {
                serde_json::json!({"index": index, "key": key})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Documents: {}", loaded.document_count);
        for s in &stats {
            println!(
                "  {} on [{}]{}: {} keys, {} documents",
                s.name,
                s.fields.join(", "),
                if s.unique { " (unique)" } else { "" },
                s.entries,
                s.documents
            );
        }
        for (index, key) in &loaded.conflicts {
            println!("  Duplicate key {} in {}", key, index);
        }
    }

    match loaded.conflicts.into_iter().next() {
        Some((index, key)) => Err(IndexError::DuplicateKey { index, key }),
        None => Ok(()),
    }
}

/// Exact-key lookup on one index.
pub fn cmd_get(
    config: &Path,
    documents: &Path,
    index_name: &str,
    query: &str,
    json: bool,
) -> IndexResult<()> {
    let loaded = load_indexes(config, documents)?;
    let index = loaded.find(index_name)?;
    let query = Document::parse(query)?;
    let found = index.get(&query);
    let docs: &[Document] = found.as_deref().map(Vec::as_slice).unwrap_or(&[]);
    print_documents(&index.key_of(&query), docs, json)
}

/// Full-scan query on one index.
pub fn cmd_scan(
    config: &Path,
    documents: &Path,
    index_name: &str,
    query: &str,
    json: bool,
) -> IndexResult<()> {
    let loaded = load_indexes(config, documents)?;
    let index = loaded.find(index_name)?;
    let matches = index.retrieve_objects(&Document::parse(query)?)?;
    if json {
        let docs: Vec<_> = matches.iter().map(Document::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&docs)?);
    } else {
        println!("{} matching documents", matches.len());
        for doc in &matches {
            println!("  {}", label(doc));
        }
    }
    Ok(())
}

/// Dry-run uniqueness check of a new or updated document against every index.
pub fn cmd_check(
    config: &Path,
    documents: &Path,
    document: &str,
    old: Option<&str>,
    json: bool,
) -> IndexResult<()> {
    let loaded = load_indexes(config, documents)?;
    let document = Document::parse(document)?;
    let old = old.map(Document::parse).transpose()?;

    let mut conflicts = Vec::new();
    for index in &loaded.indexes {
        for key in index.check_add_or_update(&document, old.as_ref()) {
            conflicts.push((index.name().to_string(), key));
        }
    }

    if json {
        let report: Vec<_> = conflicts
            .iter()
            .map(|(index, key)| serde_json::json!({"index": index, "key": key}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if conflicts.is_empty() {
        println!("OK: no uniqueness conflicts");
    } else {
        for (index, key) in &conflicts {
            println!("Conflict: {} in {}", key, index);
        }
    }

    match conflicts.into_iter().next() {
        Some((index, key)) => Err(IndexError::DuplicateKey { index, key }),
        None => Ok(()),
    }
}

fn print_documents(key: &CompositeKey, docs: &[Document], json: bool) -> IndexResult<()> {
    if json {
        let out = serde_json::json!({
            "key": key,
            "documents": docs.iter().map(Document::to_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if docs.is_empty() {
        println!("No entry for key {}", key);
    } else {
        println!("Key {}: {} documents", key, docs.len());
        for doc in docs {
            println!("  {}", label(doc));
        }
    }
    Ok(())
}

/// Short label for a document: its id when it has one.
fn label(doc: &Document) -> String {
    match doc.get(ID_FIELD) {
        Some(id) => format!("{}={}", ID_FIELD, id),
        None => doc.to_string(),
    }
}
