use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Document;
use crate::types::DocumentId;

/// Documents in insertion order plus an id index into that order.
#[derive(Default)]
pub(crate) struct CollectionState {
    pub(crate) docs: Vec<Arc<Document>>,
    pub(crate) by_id: HashMap<DocumentId, usize>,
}

/// A named set of documents. One lock guards the whole collection; scans copy the
/// `Arc` pointers out under the read lock and never observe a half-applied write.
pub struct Collection {
    pub(crate) name: String,
    pub(crate) state: RwLock<CollectionState>,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: RwLock::new(CollectionState::default()) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).field("len", &self.len()).finish()
    }
}
