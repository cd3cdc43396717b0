//! Extended-JSON helpers. `{"$oid": ..}` and `{"$date": ..}` become `ObjectId` and
//! `DateTime` values on the way in.

use bson::{Bson, Document as BsonDocument};

use crate::errors::DbError;

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// `InvalidJson` when the value is not an object or holds malformed extended JSON.
pub fn value_to_document(val: serde_json::Value) -> Result<BsonDocument, DbError> {
    match val {
        serde_json::Value::Object(map) => {
            BsonDocument::try_from(map).map_err(|e| DbError::InvalidJson(e.to_string()))
        }
        other => Err(DbError::InvalidJson(format!("expected JSON object, got {}", kind(&other)))),
    }
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
///
/// # Errors
/// `InvalidJson` on syntax errors or a non-object top level.
pub fn parse_document(json: &str) -> Result<BsonDocument, DbError> {
    let val: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DbError::InvalidJson(e.to_string()))?;
    value_to_document(val)
}

/// Parse a JSON array of objects, e.g. a batch for `insert_many` or a pipeline.
///
/// # Errors
/// `InvalidJson` on syntax errors, a non-array top level, or a non-object element.
pub fn parse_document_array(json: &str) -> Result<Vec<BsonDocument>, DbError> {
    let val: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DbError::InvalidJson(e.to_string()))?;
    value_to_document_array(val)
}

/// # Errors
/// `InvalidJson` when `val` is not an array of objects.
pub fn value_to_document_array(val: serde_json::Value) -> Result<Vec<BsonDocument>, DbError> {
    match val {
        serde_json::Value::Array(items) => items.into_iter().map(value_to_document).collect(),
        other => Err(DbError::InvalidJson(format!("expected JSON array, got {}", kind(&other)))),
    }
}

/// Relaxed extended-JSON rendering used for output.
#[must_use]
pub fn document_to_json(doc: &BsonDocument) -> serde_json::Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

fn kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
