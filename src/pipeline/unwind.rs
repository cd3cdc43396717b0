use bson::{Bson, Document as BsonDocument};

use super::types::UnwindSpec;
use crate::document::{remove_path, resolve_strict, set_path};

/// Expands one document. An array of N elements yields N copies with the element in
/// place of the array; an empty array yields nothing unless preserved; anything else
/// passes through.
pub(crate) fn expand(doc: BsonDocument, spec: &UnwindSpec) -> Vec<BsonDocument> {
    let items = match resolve_strict(&doc, &spec.path) {
        Some(Bson::Array(items)) => items.clone(),
        _ => return vec![with_index(doc, spec, Bson::Null)],
    };
    if items.is_empty() {
        if !spec.preserve_null_and_empty {
            return Vec::new();
        }
        let mut out = doc;
        remove_path(&mut out, &spec.path);
        return vec![with_index(out, spec, Bson::Null)];
    }
    items
        .into_iter()
        .zip(0_i64..)
        .map(|(item, i)| {
            let mut copy = doc.clone();
            set_path(&mut copy, &spec.path, item);
            with_index(copy, spec, Bson::Int64(i))
        })
        .collect()
}

fn with_index(mut doc: BsonDocument, spec: &UnwindSpec, index: Bson) -> BsonDocument {
    if let Some(path) = &spec.include_array_index {
        set_path(&mut doc, path, index);
    }
    doc
}
