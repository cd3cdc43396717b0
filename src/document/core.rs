use bson::{Bson, Document as BsonDocument};

use crate::errors::DbError;
use crate::types::DocumentId;

/// A stored record. `data` always starts with `_id`, which mirrors `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
}

impl Document {
    /// Wraps raw data for storage, taking `_id` from the data or assigning a fresh one.
    ///
    /// # Errors
    /// Returns `InvalidDocumentId` when `_id` is present but is not an `ObjectId`.
    pub fn new(data: BsonDocument) -> Result<Self, DbError> {
        let id = match data.get("_id") {
            None => DocumentId::new(),
            Some(Bson::ObjectId(oid)) => DocumentId(*oid),
            Some(other) => {
                return Err(DbError::InvalidDocumentId(format!(
                    "_id must be an ObjectId, got {other}"
                )));
            }
        };
        Ok(Self::with_id(id, data))
    }

    /// Builds a document under a known identifier, overwriting any `_id` in `data`.
    #[must_use]
    pub fn with_id(id: DocumentId, data: BsonDocument) -> Self {
        let mut out = BsonDocument::new();
        out.insert("_id", Bson::ObjectId(id.0));
        for (k, v) in data {
            if k != "_id" {
                out.insert(k, v);
            }
        }
        Self { id, data: out }
    }

    #[must_use]
    pub fn into_data(self) -> BsonDocument {
        self.data
    }
}
