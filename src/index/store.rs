//! Entry storage behind a single exclusive section.
//!
//! All mutation and scan paths go through [`EntryStore::exclusive`]; point
//! lookups may use [`EntryStore::peek`], which only takes a shared read guard.
//! Lists are published as `Arc<Vec<Document>>` snapshots, so a reader never
//! sees a half-updated list and can't mutate index state through one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{CompositeKey, Document};

/// Immutable snapshot of the documents stored under one key.
pub type Documents = Arc<Vec<Document>>;

type Entries = HashMap<CompositeKey, Documents>;

/// Mapping from composite key to the non-empty list of documents holding it.
#[derive(Default)]
pub struct EntryStore {
    entries: RwLock<Entries>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the exclusive section. Held for the whole of a compound
    /// operation so check-then-set and remove-then-insert stay atomic.
    pub fn exclusive(&self) -> Section<'_> {
        let entries = self.entries.write().unwrap_or_else(|poisoned| {
            log::warn!("Recovering poisoned index entry lock");
            poisoned.into_inner()
        });
        Section { entries }
    }

    /// Best-effort lookup of a single key under a shared guard. The returned
    /// snapshot may be superseded as soon as the guard is released.
    pub fn peek(&self, key: &CompositeKey) -> Option<Documents> {
        self.read().get(key).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|poisoned| {
            log::warn!("Recovering poisoned index entry lock");
            poisoned.into_inner()
        })
    }
}

/// Exclusive access to the entries for the duration of one operation.
pub struct Section<'a> {
    entries: RwLockWriteGuard<'a, Entries>,
}

impl Section<'_> {
    pub fn get(&self, key: &CompositeKey) -> Option<&Documents> {
        self.entries.get(key)
    }

    /// Create the entry `[document]` only if `key` is absent.
    /// Hands the key back (and changes nothing) when it is taken.
    pub fn insert_if_absent(
        &mut self,
        key: CompositeKey,
        document: Document,
    ) -> Result<(), CompositeKey> {
        if self.entries.contains_key(&key) {
            return Err(key);
        }
        self.entries.insert(key, Arc::new(vec![document]));
        Ok(())
    }

    /// Append `document` to the entry for `key`, creating it if needed.
    /// A document already present under the key is not added twice.
    pub fn append(&mut self, key: CompositeKey, document: Document) {
        let docs = self.entries.entry(key).or_default();
        if !docs.contains(&document) {
            Arc::make_mut(docs).push(document);
        }
    }

    /// Remove one occurrence of `document` from the entry for `key`,
    /// deleting the entry when it becomes empty. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, key: &CompositeKey, document: &Document) -> bool {
        let Some(docs) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(pos) = docs.iter().position(|d| d == document) else {
            return false;
        };
        if docs.len() == 1 {
            self.entries.remove(key);
        } else {
            Arc::make_mut(docs).remove(pos);
        }
        true
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of stored documents across all keys.
    pub fn document_count(&self) -> usize {
        self.entries.values().map(|docs| docs.len()).sum()
    }

    /// All documents, entry by entry.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.entries.values().flat_map(|docs| docs.iter())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
