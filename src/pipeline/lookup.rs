use bson::{Bson, Document as BsonDocument};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::types::LookupSpec;
use crate::document::{Document, ValueKey, resolve, set_path};

/// Hash index over one foreign collection snapshot, keyed by the value of the
/// foreign field. Array values are indexed under the whole array and under each
/// element; missing values share the `null` key.
pub(crate) struct ForeignIndex {
    docs: Vec<Arc<Document>>,
    by_key: HashMap<ValueKey, Vec<usize>>,
}

impl ForeignIndex {
    pub(crate) fn build(docs: Vec<Arc<Document>>, spec: &LookupSpec) -> Self {
        let mut by_key: HashMap<ValueKey, Vec<usize>> = HashMap::new();
        let mut add = |key: ValueKey, pos: usize| {
            let slot = by_key.entry(key).or_default();
            if slot.last() != Some(&pos) {
                slot.push(pos);
            }
        };
        for (pos, doc) in docs.iter().enumerate() {
            let value = resolve(&doc.data, &spec.foreign_field);
            if let Some(Bson::Array(items)) = &value {
                for item in items {
                    add(ValueKey::of(item), pos);
                }
            }
            add(ValueKey::of_resolved(value.as_ref()), pos);
        }
        log::debug!(
            "indexed {} documents of {} on {} ({} keys)",
            docs.len(),
            spec.from,
            spec.foreign_field,
            by_key.len()
        );
        Self { docs, by_key }
    }

    /// Positions of foreign documents matching `local`, ascending so that matches keep
    /// foreign insertion order.
    fn matches(&self, local: Option<&Bson>) -> BTreeSet<usize> {
        let mut hits = BTreeSet::new();
        let mut take = |key: &ValueKey| {
            if let Some(positions) = self.by_key.get(key) {
                hits.extend(positions.iter().copied());
            }
        };
        match local {
            Some(Bson::Array(items)) => {
                for item in items {
                    take(&ValueKey::of(item));
                }
            }
            other => take(&ValueKey::of_resolved(other)),
        }
        hits
    }

    /// Attaches the matching foreign documents (possibly none) as an array.
    pub(crate) fn attach(&self, mut doc: BsonDocument, spec: &LookupSpec) -> BsonDocument {
        let local = resolve(&doc, &spec.local_field);
        let joined: Vec<Bson> = self
            .matches(local.as_ref())
            .into_iter()
            .map(|pos| Bson::Document(self.docs[pos].data.clone()))
            .collect();
        set_path(&mut doc, &spec.as_field, Bson::Array(joined));
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    fn stored(data: BsonDocument) -> Arc<Document> {
        Arc::new(Document::new(data).unwrap())
    }

    fn joined(out: &BsonDocument, field: &str) -> Vec<BsonDocument> {
        out.get_array(field)
            .unwrap()
            .iter()
            .map(|b| b.as_document().unwrap().clone())
            .collect()
    }

    #[test]
    fn joins_on_object_ids_and_keeps_unmatched() {
        let john = ObjectId::new();
        let customers = vec![stored(doc! {"_id": john, "name": "John Doe"}), stored(doc! {"name": "Jane Smith"})];
        let spec = LookupSpec::new("customers", "_id", "_id", "customer").unwrap();
        let idx = ForeignIndex::build(customers, &spec);

        let hit = idx.attach(doc! {"_id": john, "total_spent": 1550}, &spec);
        assert_eq!(joined(&hit, "customer")[0].get_str("name").unwrap(), "John Doe");

        let miss = idx.attach(doc! {"_id": ObjectId::new()}, &spec);
        assert!(miss.get_array("customer").unwrap().is_empty());
    }

    #[test]
    fn many_matches_keep_foreign_order() {
        let cust = ObjectId::new();
        let orders = vec![
            stored(doc! {"order_id": "A", "customer_id": cust}),
            stored(doc! {"order_id": "B", "customer_id": ObjectId::new()}),
            stored(doc! {"order_id": "C", "customer_id": cust}),
        ];
        let spec = LookupSpec::new("orders", "_id", "customer_id", "orders").unwrap();
        let out = ForeignIndex::build(orders, &spec).attach(doc! {"_id": cust}, &spec);
        let ids: Vec<_> = joined(&out, "orders").iter().map(|d| d.get_str("order_id").unwrap().to_owned()).collect();
        assert_eq!(ids, ["A", "C"]);
    }

    #[test]
    fn array_values_match_by_element_on_either_side() {
        let foreign = vec![stored(doc! {"tags": ["x", "y"]}), stored(doc! {"tags": "z"})];
        let spec = LookupSpec::new("f", "want", "tags", "hits").unwrap();
        let idx = ForeignIndex::build(foreign, &spec);
        assert_eq!(joined(&idx.attach(doc! {"want": "y"}, &spec), "hits").len(), 1);
        assert_eq!(joined(&idx.attach(doc! {"want": ["x", "z"]}, &spec), "hits").len(), 2);
    }

    #[test]
    fn missing_local_matches_null_or_missing_foreign() {
        let foreign = vec![stored(doc! {"k": Bson::Null}), stored(doc! {}), stored(doc! {"k": 1})];
        let spec = LookupSpec::new("f", "k", "k", "m").unwrap();
        let out = ForeignIndex::build(foreign, &spec).attach(doc! {}, &spec);
        assert_eq!(out.get_array("m").unwrap().len(), 2);
    }

    #[test]
    fn empty_foreign_attaches_empty_arrays() {
        let spec = LookupSpec::new("nowhere", "a", "b", "joined.items").unwrap();
        let out = ForeignIndex::build(Vec::new(), &spec).attach(doc! {"a": 1}, &spec);
        assert_eq!(out, doc! {"a": 1, "joined": {"items": []}});
    }
}
