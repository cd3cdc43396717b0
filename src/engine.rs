use bson::Document as BsonDocument;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::pipeline::{Cursor, DocStream, Pipeline, Snapshots};
use crate::types::{CollectionName, DocumentId};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Aggregations slower than this are logged and counted as slow.
    pub slow_pipeline_ms: u64,
    /// Upper bound on documents a single cursor yields; `None` means unbounded.
    pub max_result_docs: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { slow_pipeline_ms: 500, max_result_docs: None }
    }
}

/// The in-memory engine: named collections plus the aggregation entry point.
pub struct Engine {
    pub(crate) options: EngineOptions,
    pub(crate) collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("collections", &self.collections.read().len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self { options, collections: RwLock::new(HashMap::new()) }
    }

    /// Returns the named collection, creating it when absent.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        if let Some(existing) = self.get_collection(name) {
            return existing;
        }
        let mut collections = self.collections.write();
        Arc::clone(collections.entry(name.to_owned()).or_insert_with(|| {
            log::info!("created collection {name}");
            Arc::new(Collection::new(name))
        }))
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Removes a collection. Cursors already running keep their snapshot.
    pub fn drop_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name).is_some();
        if removed {
            log::info!("dropped collection {name}");
        }
        removed
    }

    /// Collection names, sorted.
    #[must_use]
    pub fn list_collection_names(&self) -> Vec<CollectionName> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// # Errors
    /// `InvalidDocumentId` or `DuplicateKey` from the collection.
    pub fn insert_one(&self, collection: &str, doc: BsonDocument) -> Result<DocumentId, DbError> {
        self.create_collection(collection).insert_document(doc)
    }

    /// # Errors
    /// `InvalidBatchDocument` or `DuplicateKey`; documents before the failing one stay inserted.
    pub fn insert_many(&self, collection: &str, docs: Vec<BsonDocument>) -> Result<Vec<DocumentId>, DbError> {
        self.create_collection(collection).insert_documents(docs)
    }

    /// # Errors
    /// `NoSuchCollection` when the collection does not exist, `InvalidDocumentId` for an
    /// `_id` change.
    pub fn replace_one(&self, collection: &str, id: &DocumentId, doc: BsonDocument) -> Result<bool, DbError> {
        self.get_collection(collection)
            .ok_or_else(|| DbError::NoSuchCollection(collection.to_owned()))?
            .replace_document(id, doc)
    }

    #[must_use]
    pub fn find_by_id(&self, collection: &str, id: &DocumentId) -> Option<Arc<Document>> {
        self.get_collection(collection)?.find_document(id)
    }

    /// Snapshot of a collection in insertion order; empty when it does not exist.
    #[must_use]
    pub fn scan(&self, collection: &str) -> Vec<Arc<Document>> {
        self.get_collection(collection).map(|c| c.snapshot()).unwrap_or_default()
    }

    /// Runs `pipeline` over `collection`. The source and every lookup target are
    /// snapshotted now; later mutations are not visible to the returned cursor.
    /// A missing source collection yields an empty result.
    #[must_use]
    pub fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Cursor {
        let source = self.scan(collection);
        let mut foreign = Snapshots::new();
        for name in pipeline.lookup_sources() {
            if !foreign.contains_key(name) {
                foreign.insert(name.to_owned(), self.scan(name));
            }
        }
        log::debug!(
            "aggregate on {collection}: {} stages over {} documents",
            pipeline.len(),
            source.len()
        );
        let stream: DocStream = Box::new(source.into_iter().map(|d| d.data.clone()));
        Cursor::new(pipeline.execute(stream, &foreign), collection, pipeline.len())
            .with_cap(self.options.max_result_docs)
            .with_slow_threshold(self.options.slow_pipeline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::utils::devlog;
    use bson::doc;

    #[test]
    fn create_is_idempotent_and_names_are_sorted() {
        let engine = Engine::default();
        let a = engine.create_collection("orders");
        engine.create_collection("customers");
        let again = engine.create_collection("orders");
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(engine.list_collection_names(), ["customers", "orders"]);
        assert!(engine.drop_collection("orders"));
        assert!(!engine.drop_collection("orders"));
    }

    #[test]
    fn aggregate_reads_a_snapshot() {
        let engine = Engine::default();
        engine.insert_one("c", doc! {"v": 1}).unwrap();
        let cursor = engine.aggregate("c", &Pipeline::new(vec![Stage::Skip(0)]).unwrap());
        engine.insert_one("c", doc! {"v": 2}).unwrap();
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn missing_source_is_empty_and_replace_needs_a_collection() {
        let engine = Engine::default();
        assert_eq!(engine.aggregate("nope", &Pipeline::default()).count(), 0);
        assert!(matches!(
            engine.replace_one("nope", &DocumentId::new(), doc! {}),
            Err(DbError::NoSuchCollection(_))
        ));
    }

    #[test]
    fn result_cap_comes_from_options() {
        let engine = Engine::new(EngineOptions { max_result_docs: Some(2), ..EngineOptions::default() });
        engine.insert_many("c", (0..5).map(|i| doc! {"i": i}).collect()).unwrap();
        assert_eq!(engine.aggregate("c", &Pipeline::default()).count(), 2);
    }

    #[test]
    fn slow_threshold_belongs_to_each_engine() {
        let strict = Engine::new(EngineOptions { slow_pipeline_ms: 0, ..EngineOptions::default() });
        let relaxed = Engine::new(EngineOptions { slow_pipeline_ms: u64::MAX, ..EngineOptions::default() });
        strict.insert_one("c", doc! {}).unwrap();
        relaxed.insert_one("c", doc! {}).unwrap();
        let capture = devlog::Capture::start();
        let _ = strict.aggregate("c", &Pipeline::default()).count();
        let _ = relaxed.aggregate("c", &Pipeline::default()).count();
        let lines = capture.take();
        assert!(lines[0].contains("\"slow\":true"), "{}", lines[0]);
        assert!(lines[1].contains("\"slow\":false"), "{}", lines[1]);
    }
}
