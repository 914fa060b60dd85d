//
// document_store.rs
//
// Authoritative map of synchronized documents, plus the staging set used
// while the editor runs a bulk scan
//

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::document::{BufferInfo, Document, DocumentId};
use crate::error::BridgeError;

// ============================================================================
// Metrics
// ============================================================================

/// Counters for store activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStoreMetrics {
    /// Lookups that found a document
    pub hits: u64,
    /// Lookups for ids the store does not track
    pub misses: u64,
    /// Documents registered
    pub registered: u64,
    /// Documents removed
    pub removed: u64,
}

// ============================================================================
// Buffer Store
// ============================================================================

/// Document id to document.
///
/// Only the foreground context touches the store, so the map itself needs no
/// locking. Background parses reach documents through their parse slots.
#[derive(Debug, Default)]
pub struct BufferStore {
    documents: HashMap<DocumentId, Document>,
    metrics: BufferStoreMetrics,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document, replacing any previous entry with the same id.
    pub fn register(&mut self, document: Document) -> &mut Document {
        self.metrics.registered += 1;
        match self.documents.entry(document.id) {
            Entry::Occupied(mut entry) => {
                log::warn!("Replacing tracked document {}", document.id);
                entry.insert(document);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(document),
        }
    }

    pub fn lookup(&mut self, id: DocumentId) -> Option<&Document> {
        self.record_lookup(id);
        self.documents.get(&id)
    }

    pub fn lookup_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.record_lookup(id);
        self.documents.get_mut(&id)
    }

    /// Look up without touching metrics.
    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.documents.contains_key(&id)
    }

    /// Remove a document. Unknown ids are an error; idempotent callers check
    /// [`BufferStore::contains`] first.
    pub fn remove(&mut self, id: DocumentId) -> Result<Document, BridgeError> {
        let document = self
            .documents
            .remove(&id)
            .ok_or(BridgeError::UnknownDocument(id))?;
        self.metrics.removed += 1;
        Ok(document)
    }

    /// Find the tracked document whose name is `path`.
    pub fn find_by_name(&self, path: &str) -> Option<DocumentId> {
        self.documents
            .values()
            .find(|doc| doc.name == path)
            .map(|doc| doc.id)
    }

    /// Ids of all tracked documents, sorted.
    pub fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.documents.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn metrics(&self) -> &BufferStoreMetrics {
        &self.metrics
    }

    fn record_lookup(&mut self, id: DocumentId) {
        if self.documents.contains_key(&id) {
            self.metrics.hits += 1;
        } else {
            self.metrics.misses += 1;
        }
    }
}

// ============================================================================
// Pending batch
// ============================================================================

/// Buffers seen during a bulk scan but not yet admitted.
///
/// Scans such as a project-wide grep open many buffers and close most of them
/// straight away. They are held here, in the order observed, until the scan
/// ends and the editor confirms which still exist.
#[derive(Debug, Default)]
pub struct PendingBatch {
    staged: IndexMap<DocumentId, BufferInfo>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a buffer; a later read of the same id replaces the earlier one.
    pub fn stage(&mut self, info: BufferInfo) {
        self.staged.insert(info.id, info);
    }

    /// Drop a staged buffer that went away during the scan.
    pub fn discard(&mut self, id: DocumentId) -> bool {
        self.staged.shift_remove(&id).is_some()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.staged.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Consume the batch, yielding staged buffers in observation order.
    pub fn into_staged(self) -> impl Iterator<Item = BufferInfo> {
        self.staged.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, name: &str) -> BufferInfo {
        BufferInfo::new(DocumentId(id), name, "package main\n")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut store = BufferStore::new();
        store.register(Document::new(info(1, "/src/a.go")));

        assert!(store.contains(DocumentId(1)));
        assert_eq!(store.lookup(DocumentId(1)).unwrap().name, "/src/a.go");
        assert!(store.lookup(DocumentId(2)).is_none());
        assert_eq!(store.metrics().hits, 1);
        assert_eq!(store.metrics().misses, 1);
    }

    #[test]
    fn test_remove_unknown_is_error() {
        let mut store = BufferStore::new();
        assert!(matches!(
            store.remove(DocumentId(7)),
            Err(BridgeError::UnknownDocument(DocumentId(7)))
        ));

        store.register(Document::new(info(7, "/src/a.go")));
        assert!(store.remove(DocumentId(7)).is_ok());
        assert!(store.is_empty());
        assert_eq!(store.metrics().removed, 1);
    }

    #[test]
    fn test_find_by_name() {
        let mut store = BufferStore::new();
        store.register(Document::new(info(1, "/src/a.go")));
        store.register(Document::new(info(2, "/src/b.go")));

        assert_eq!(store.find_by_name("/src/b.go"), Some(DocumentId(2)));
        assert_eq!(store.find_by_name("/src/c.go"), None);
        assert_eq!(store.ids(), vec![DocumentId(1), DocumentId(2)]);
    }

    #[test]
    fn test_pending_batch_keeps_observation_order() {
        let mut batch = PendingBatch::new();
        batch.stage(info(3, "/src/c.go"));
        batch.stage(info(1, "/src/a.go"));
        batch.stage(info(2, "/src/b.go"));
        assert!(batch.discard(DocumentId(1)));
        assert!(!batch.discard(DocumentId(9)));

        let ids: Vec<_> = batch.into_staged().map(|b| b.id).collect();
        assert_eq!(ids, vec![DocumentId(3), DocumentId(2)]);
    }
}
