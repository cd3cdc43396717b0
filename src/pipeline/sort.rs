use bson::Document as BsonDocument;

use crate::query::{SortSpec, compare_docs};

/// Stable in-place sort; documents with equal keys keep their arrival order.
pub(crate) fn sort(mut docs: Vec<BsonDocument>, keys: &[SortSpec]) -> Vec<BsonDocument> {
    docs.sort_by(|a, b| compare_docs(a, b, keys));
    docs
}
