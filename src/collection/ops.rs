use bson::Document as BsonDocument;
use std::sync::Arc;

use super::core::{Collection, CollectionState};
use crate::document::Document;
use crate::errors::DbError;
use crate::telemetry;
use crate::types::DocumentId;

impl CollectionState {
    fn push(&mut self, document: Document) -> DocumentId {
        let id = document.id;
        self.by_id.insert(id, self.docs.len());
        self.docs.push(Arc::new(document));
        id
    }
}

impl Collection {
    /// Inserts one document, assigning `_id` when absent.
    ///
    /// # Errors
    /// `InvalidDocumentId` for a non-ObjectId `_id`, `DuplicateKey` when the id exists.
    pub fn insert_document(&self, data: BsonDocument) -> Result<DocumentId, DbError> {
        let document = Document::new(data)?;
        let mut st = self.state.write();
        if st.by_id.contains_key(&document.id) {
            return Err(self.duplicate(document.id, 0, 0));
        }
        let id = st.push(document);
        drop(st);
        telemetry::record_inserts(1);
        log::debug!("inserted {id} into {}", self.name);
        Ok(id)
    }

    /// Inserts a batch under a single write lock. Stops at the first invalid or
    /// duplicate document; everything before it stays inserted.
    ///
    /// # Errors
    /// `DuplicateKey` or `InvalidBatchDocument`, both carrying the failing position.
    pub fn insert_documents(&self, batch: Vec<BsonDocument>) -> Result<Vec<DocumentId>, DbError> {
        let mut ids = Vec::with_capacity(batch.len());
        let mut st = self.state.write();
        for (position, data) in batch.into_iter().enumerate() {
            let document = match Document::new(data) {
                Ok(d) => d,
                Err(e) => {
                    drop(st);
                    telemetry::record_inserts(ids.len());
                    log::warn!("insert_many into {} stopped at position {position}: {e}", self.name);
                    return Err(DbError::InvalidBatchDocument {
                        collection: self.name.clone(),
                        position,
                        inserted: ids.len(),
                        reason: e.to_string(),
                    });
                }
            };
            if st.by_id.contains_key(&document.id) {
                drop(st);
                telemetry::record_inserts(ids.len());
                return Err(self.duplicate(document.id, position, ids.len()));
            }
            ids.push(st.push(document));
        }
        drop(st);
        telemetry::record_inserts(ids.len());
        log::info!("inserted {} documents into {}", ids.len(), self.name);
        Ok(ids)
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Arc<Document>> {
        let st = self.state.read();
        st.by_id.get(id).map(|&pos| Arc::clone(&st.docs[pos]))
    }

    /// Replaces the document stored under `id`, keeping its position in scan order.
    /// Returns `Ok(false)` when no such document exists.
    ///
    /// # Errors
    /// `InvalidDocumentId` when `data` carries an `_id` different from `id`.
    pub fn replace_document(&self, id: &DocumentId, data: BsonDocument) -> Result<bool, DbError> {
        match data.get("_id") {
            None => {}
            Some(bson::Bson::ObjectId(oid)) if *oid == id.0 => {}
            Some(other) => {
                return Err(DbError::InvalidDocumentId(format!(
                    "_id is immutable: {id} cannot become {other}"
                )));
            }
        }
        let mut st = self.state.write();
        let Some(&pos) = st.by_id.get(id) else {
            return Ok(false);
        };
        st.docs[pos] = Arc::new(Document::with_id(*id, data));
        drop(st);
        log::debug!("replaced {id} in {}", self.name);
        Ok(true)
    }

    /// Point-in-time copy of the documents in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Document>> {
        self.state.read().docs.clone()
    }

    fn duplicate(&self, id: DocumentId, position: usize, inserted: usize) -> DbError {
        telemetry::record_duplicate_reject();
        log::warn!("duplicate _id {id} rejected by {}", self.name);
        DbError::DuplicateKey { collection: self.name.clone(), id: id.to_hex(), position, inserted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn insert_then_find_round_trips() {
        let col = Collection::new("customers");
        let id = col.insert_document(doc! {"name": "John Doe", "address": {"city": "Springfield"}}).unwrap();
        let found = col.find_document(&id).unwrap();
        assert_eq!(found.data, doc! {"_id": id.0, "name": "John Doe", "address": {"city": "Springfield"}});
    }

    #[test]
    fn insert_many_keeps_prefix_on_duplicate() {
        let col = Collection::new("orders");
        let dup = ObjectId::new();
        col.insert_document(doc! {"_id": dup}).unwrap();
        let err = col
            .insert_documents(vec![doc! {"n": 1}, doc! {"n": 2}, doc! {"_id": dup}, doc! {"n": 4}])
            .unwrap_err();
        match err {
            DbError::DuplicateKey { position, inserted, .. } => {
                assert_eq!(position, 2);
                assert_eq!(inserted, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn insert_many_reports_position_of_bad_id() {
        let col = Collection::new("orders");
        let err = col.insert_documents(vec![doc! {"n": 1}, doc! {"_id": 7}, doc! {"n": 3}]).unwrap_err();
        assert!(matches!(err, DbError::InvalidBatchDocument { position: 1, inserted: 1, .. }), "{err:?}");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn duplicate_within_one_batch_is_rejected() {
        let col = Collection::new("orders");
        let oid = ObjectId::new();
        let err = col.insert_documents(vec![doc! {"_id": oid}, doc! {"_id": oid}]).unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { position: 1, inserted: 1, .. }));
    }

    #[test]
    fn replace_keeps_position_and_id() {
        let col = Collection::new("c");
        let a = col.insert_document(doc! {"v": 1}).unwrap();
        let b = col.insert_document(doc! {"v": 2}).unwrap();
        assert!(col.replace_document(&a, doc! {"v": 10}).unwrap());
        let snap = col.snapshot();
        assert_eq!(snap[0].data, doc! {"_id": a.0, "v": 10});
        assert_eq!(snap[1].id, b);
        assert!(!col.replace_document(&DocumentId::new(), doc! {}).unwrap());
        assert!(col.replace_document(&a, doc! {"_id": b.0}).is_err());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_inserts() {
        let col = Collection::new("c");
        col.insert_document(doc! {"v": 1}).unwrap();
        let snap = col.snapshot();
        col.insert_document(doc! {"v": 2}).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(col.len(), 2);
    }
}
