//! In-memory document store with a MongoDB-style aggregation pipeline.
//!
//! ```no_run
//! use aggrelite::{AggregateOptions, Database};
//! use bson::doc;
//!
//! let db = Database::new();
//! db.insert_many("orders", vec![doc! {"status": "shipped"}, doc! {"status": "pending"}])?;
//! let by_status = db.aggregate_json(
//!     "orders",
//!     r#"[{"$group": {"_id": "$status", "order_count": {"$sum": 1}}}]"#,
//!     &AggregateOptions::default(),
//! )?;
//! for row in by_status {
//!     println!("{row}");
//! }
//! # Ok::<(), aggrelite::errors::DbError>(())
//! ```

pub mod cli;
pub mod collection;
pub mod document;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod query;
pub mod types;
pub mod utils;

pub use query::telemetry;

use bson::{DateTime, Document as BsonDocument};
use std::sync::Arc;

use crate::collection::Collection;
use crate::document::Document;
use crate::engine::{Engine, EngineOptions};
use crate::errors::DbError;
use crate::pipeline::{Cursor, Pipeline, Stage};
use crate::query::ParseContext;
use crate::types::DocumentId;

include!(concat!(env!("OUT_DIR"), "/compiled_features.rs"));

/// Per-call aggregation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    /// Reference instant bound to `$$NOW` in stage descriptors.
    pub now: Option<DateTime>,
}

impl AggregateOptions {
    #[must_use]
    pub fn at(now: DateTime) -> Self {
        Self { now: Some(now) }
    }

    fn context(self) -> ParseContext {
        ParseContext { now: self.now }
    }
}

/// Handle to an in-memory database. Cloning is cheap and clones share the data.
#[derive(Clone, Debug)]
pub struct Database {
    engine: Arc<Engine>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    #[must_use]
    pub fn with_options(options: EngineOptions) -> Self {
        Self { engine: Arc::new(Engine::new(options)) }
    }

    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.engine.create_collection(name)
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    pub fn drop_collection(&self, name: &str) -> bool {
        self.engine.drop_collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    /// Inserts one document, creating the collection on first use. `_id` is assigned
    /// when absent.
    ///
    /// # Errors
    /// `InvalidDocumentId` for a non-ObjectId `_id`, `DuplicateKey` for a taken one.
    pub fn insert_one(&self, collection: &str, doc: BsonDocument) -> Result<DocumentId, DbError> {
        self.engine.insert_one(collection, doc)
    }

    /// Inserts a batch in order under one write lock. The batch is not rolled back:
    /// on failure the documents before the offending one remain inserted, and the
    /// error reports how many that was.
    ///
    /// # Errors
    /// `DuplicateKey { position, inserted, .. }` or `InvalidBatchDocument { position, inserted, .. }`.
    pub fn insert_many(&self, collection: &str, docs: Vec<BsonDocument>) -> Result<Vec<DocumentId>, DbError> {
        self.engine.insert_many(collection, docs)
    }

    /// Replaces a document's content, keeping its identifier and scan position.
    /// Returns `Ok(false)` if no document has that id.
    ///
    /// # Errors
    /// `NoSuchCollection`, or `InvalidDocumentId` when `doc` tries to change `_id`.
    pub fn replace_one(&self, collection: &str, id: &DocumentId, doc: BsonDocument) -> Result<bool, DbError> {
        self.engine.replace_one(collection, id, doc)
    }

    #[must_use]
    pub fn find_by_id(&self, collection: &str, id: &DocumentId) -> Option<Arc<Document>> {
        self.engine.find_by_id(collection, id)
    }

    /// All documents of a collection in insertion order.
    #[must_use]
    pub fn scan(&self, collection: &str) -> Vec<Arc<Document>> {
        self.engine.scan(collection)
    }

    /// Validates `stages` and runs them over `collection`.
    ///
    /// # Errors
    /// `InvalidStage` before any document is read.
    pub fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> Result<Cursor, DbError> {
        let pipeline = Pipeline::new(stages)?;
        Ok(self.engine.aggregate(collection, &pipeline))
    }

    /// Runs an already built pipeline; useful when the same pipeline runs repeatedly.
    #[must_use]
    pub fn aggregate_pipeline(&self, collection: &str, pipeline: &Pipeline) -> Cursor {
        self.engine.aggregate(collection, pipeline)
    }

    /// Runs MongoDB-shaped stage documents.
    ///
    /// # Errors
    /// `InvalidStage` for the first malformed stage.
    pub fn aggregate_bson(
        &self,
        collection: &str,
        stages: &[BsonDocument],
        opts: &AggregateOptions,
    ) -> Result<Cursor, DbError> {
        let pipeline = Pipeline::from_bson(stages, &opts.context())?;
        Ok(self.engine.aggregate(collection, &pipeline))
    }

    /// Runs a JSON array of stage documents (extended JSON values allowed).
    ///
    /// # Errors
    /// `InvalidJson` or `InvalidStage`.
    pub fn aggregate_json(&self, collection: &str, json: &str, opts: &AggregateOptions) -> Result<Cursor, DbError> {
        let pipeline = Pipeline::parse_json(json, &opts.context())?;
        Ok(self.engine.aggregate(collection, &pipeline))
    }
}

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error if the logger cannot be initialized.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    utils::logger::init()
}
