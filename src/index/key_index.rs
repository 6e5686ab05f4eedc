//! Composite-key index: maps the key extracted from a set of fields to the
//! documents holding it, optionally enforcing uniqueness.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::store::{Documents, EntryStore, Section};
use crate::config::IndexDefinition;
use crate::extract::{FieldExtractor, PathExtractor};
use crate::query::{ExpressionParser, QueryCompiler};
use crate::types::{CompositeKey, Document, IndexError, IndexResult};

/// How `add_or_update` treats the previous version of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Check the new key first; the old document is only removed once the
    /// new one is known to fit. A rejected update leaves the index unchanged.
    #[default]
    Atomic,
    /// Remove the old document, then insert the new one. A rejected update
    /// leaves the old document un-indexed.
    RemoveThenInsert,
}

/// Point-in-time statistics of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
    /// Distinct composite keys.
    pub entries: usize,
    /// Documents across all keys.
    pub documents: usize,
    /// Full scans served so far.
    pub used_time: u64,
}

/// A secondary index over documents.
///
/// Mutations, scans and counts are serialized on one exclusive section;
/// [`Index::get`] is a best-effort read that only takes a shared guard.
pub struct Index {
    name: String,
    fields: Vec<String>,
    unique: bool,
    update_mode: UpdateMode,
    store: EntryStore,
    used_time: AtomicU64,
    extractor: Box<dyn FieldExtractor>,
    compiler: Box<dyn QueryCompiler>,
}

impl Index {
    /// Create an index over `fields`, in key order.
    pub fn new<I>(name: impl Into<String>, fields: I, unique: bool) -> IndexResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let name = name.into();
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(IndexError::EmptyFields(name));
        }
        Ok(Self {
            name,
            fields,
            unique,
            update_mode: UpdateMode::default(),
            store: EntryStore::new(),
            used_time: AtomicU64::new(0),
            extractor: Box::new(PathExtractor),
            compiler: Box::new(ExpressionParser),
        })
    }

    /// Create an index from a key-specification document such as
    /// `{"last": 1, "first": 1}`. Field order follows the document.
    pub fn from_key_spec(
        name: impl Into<String>,
        keys: &Document,
        unique: bool,
    ) -> IndexResult<Self> {
        Self::new(name, keys.keys(), unique)
    }

    /// Create an index from its configuration entry.
    pub fn from_definition(def: &IndexDefinition) -> IndexResult<Self> {
        Ok(Self::new(def.name.clone(), def.fields.iter().cloned(), def.unique)?
            .with_update_mode(def.update_mode))
    }

    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    /// Replace the field extractor.
    pub fn with_extractor(mut self, extractor: Box<dyn FieldExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the query compiler used by full scans.
    pub fn with_compiler(mut self, compiler: Box<dyn QueryCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// The composite key this index derives from a document or query.
    pub fn key_of(&self, document: &Document) -> CompositeKey {
        self.extractor.extract(document, &self.fields)
    }

    /// Insert `document`, or replace `old` with it when `old` is given.
    ///
    /// Returns the conflicting key when a unique index already holds another
    /// document under the new key, or an empty list on success.
    #[must_use]
    pub fn add_or_update(
        &self,
        document: &Document,
        old: Option<&Document>,
    ) -> Vec<CompositeKey> {
        let mut section = self.store.exclusive();
        self.apply(&mut section, document, old)
    }

    /// Dry run of [`Index::add_or_update`]: reports the conflict it would
    /// hit, tolerating a clash with `old` itself. Never mutates.
    #[must_use]
    pub fn check_add_or_update(
        &self,
        document: &Document,
        old: Option<&Document>,
    ) -> Vec<CompositeKey> {
        if !self.unique {
            return Vec::new();
        }
        let key = self.key_of(document);
        let section = self.store.exclusive();
        match section.get(&key) {
            Some(existing) if !old.is_some_and(|o| existing.contains(o)) => vec![key],
            _ => Vec::new(),
        }
    }

    /// Remove `document` from the index. No-op if it isn't indexed.
    pub fn remove(&self, document: &Document) {
        let key = self.key_of(document);
        self.store.exclusive().remove(&key, document);
    }

    /// Insert every document in order, stopping at the first uniqueness
    /// violation. Documents inserted before the failing one stay indexed.
    #[must_use]
    pub fn add_all<'a, I>(&self, documents: I) -> Vec<CompositeKey>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut section = self.store.exclusive();
        let mut added = 0usize;
        for document in documents {
            let conflicts = self.apply(&mut section, document, None);
            if !conflicts.is_empty() {
                log::debug!(
                    "Bulk load into index '{}' stopped after {} documents",
                    self.name,
                    added
                );
                return conflicts;
            }
            added += 1;
        }
        log::debug!("Bulk loaded {} documents into index '{}'", added, self.name);
        Vec::new()
    }

    /// Drop every entry. The scan counter is kept.
    pub fn clear(&self) {
        self.store.exclusive().clear();
    }

    /// Best-effort exact-key lookup: the key is extracted from `query` and
    /// the current snapshot for it returned. Takes a shared guard, so it
    /// never blocks other lookups, but it waits behind a writer holding the
    /// exclusive section (a running `add_all` or `retrieve_objects`, say).
    /// The result may already be stale when the caller looks at it.
    pub fn get(&self, query: &Document) -> Option<Documents> {
        self.store.peek(&self.key_of(query))
    }

    /// Exact-key lookup serialized with mutations and scans.
    pub fn get_consistent(&self, query: &Document) -> Option<Documents> {
        let key = self.key_of(query);
        self.store.exclusive().get(&key).cloned()
    }

    /// Full scan: every indexed document matching `query`, whatever key it
    /// is stored under. Each call counts as one use of the index.
    pub fn retrieve_objects(&self, query: &Document) -> IndexResult<Vec<Document>> {
        let section = self.store.exclusive();
        self.used_time.fetch_add(1, Ordering::Relaxed);
        let filter = self.compiler.compile(query)?;
        let result: Vec<Document> = section
            .documents()
            .filter(|doc| filter(*doc))
            .cloned()
            .collect();
        log::trace!(
            "Scan of index '{}' matched {} of {} documents",
            self.name,
            result.len(),
            section.document_count()
        );
        Ok(result)
    }

    /// Number of distinct keys (not documents).
    pub fn size(&self) -> usize {
        self.store.exclusive().len()
    }

    /// Every indexed document, entry by entry.
    pub fn values(&self) -> Vec<Document> {
        self.store.exclusive().documents().cloned().collect()
    }

    /// Number of full scans served.
    pub fn used_time(&self) -> u64 {
        self.used_time.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> IndexStats {
        let section = self.store.exclusive();
        IndexStats {
            name: self.name.clone(),
            fields: self.fields.clone(),
            unique: self.unique,
            entries: section.len(),
            documents: section.document_count(),
            used_time: self.used_time(),
        }
    }

    /// Turn a conflict list into a hard error for callers that abort on
    /// the first violation.
    pub fn into_violation(&self, conflicts: Vec<CompositeKey>) -> IndexResult<()> {
        match conflicts.into_iter().next() {
            Some(key) => Err(IndexError::DuplicateKey {
                index: self.name.clone(),
                key,
            }),
            None => Ok(()),
        }
    }

    fn apply(
        &self,
        section: &mut Section<'_>,
        document: &Document,
        old: Option<&Document>,
    ) -> Vec<CompositeKey> {
        let key = self.key_of(document);
        let old = old.map(|o| (self.key_of(o), o));

        if self.update_mode == UpdateMode::RemoveThenInsert {
            if let Some((old_key, old_doc)) = &old {
                section.remove(old_key, old_doc);
            }
        }

        if self.unique {
            if let Some(existing) = section.get(&key) {
                let replacing_self = self.update_mode == UpdateMode::Atomic
                    && old.as_ref().is_some_and(|(_, o)| existing.contains(o));
                if !replacing_self {
                    log::debug!("Duplicate key {} in unique index '{}'", key, self.name);
                    return vec![key];
                }
            }
        }

        if self.update_mode == UpdateMode::Atomic {
            if let Some((old_key, old_doc)) = &old {
                section.remove(old_key, old_doc);
            }
        }

        if self.unique {
            // Only reachable when the extractor keys `old` differently from
            // the entry that held it, so the entry was not emptied above.
            if let Err(key) = section.insert_if_absent(key, document.clone()) {
                log::warn!(
                    "Key {} in unique index '{}' still taken after removing the old document",
                    key,
                    self.name
                );
                return vec![key];
            }
        } else {
            section.append(key, document.clone());
        }
        Vec::new()
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index{{name='{}'}}", self.name)
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("unique", &self.unique)
            .field("update_mode", &self.update_mode)
            .finish_non_exhaustive()
    }
}
