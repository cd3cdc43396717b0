use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DbError;

pub type CollectionName = String;

/// Document identifier. Opaque and comparable; rendered as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub ObjectId);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for DocumentId {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|e| DbError::InvalidDocumentId(format!("{s}: {e}")))
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<DocumentId> for bson::Bson {
    fn from(id: DocumentId) -> Self {
        Self::ObjectId(id.0)
    }
}
