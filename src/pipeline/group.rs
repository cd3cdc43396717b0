use bson::{Bson, Document as BsonDocument};
use std::collections::HashMap;

use super::types::{Accumulator, GroupSpec};
use crate::document::ValueKey;

/// Running numeric total. Stays integral until a double shows up or i64 overflows.
#[derive(Debug, Clone, Copy)]
enum Total {
    Int(i64),
    Double(f64),
}

impl Total {
    #[allow(clippy::cast_precision_loss)]
    fn add(self, v: &Bson) -> Self {
        let int = match v {
            Bson::Int32(i) => Some(i64::from(*i)),
            Bson::Int64(i) => Some(*i),
            _ => None,
        };
        match (self, int) {
            (Self::Int(acc), Some(i)) => acc.checked_add(i).map_or(Self::Double(acc as f64 + i as f64), Self::Int),
            (Self::Double(acc), Some(i)) => Self::Double(acc + i as f64),
            (_, None) => match crate::document::as_f64(v) {
                Some(f) => Self::Double(self.as_f64() + f),
                None => self,
            },
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Double(f) => f,
        }
    }

    fn into_bson(self) -> Bson {
        match self {
            Self::Int(i) => i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32),
            Self::Double(f) => Bson::Double(f),
        }
    }
}

#[derive(Debug)]
enum AccState {
    Sum(Total),
    Count(i64),
    First(Option<Bson>),
}

impl AccState {
    fn start(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum(Total::Int(0)),
            Accumulator::Count => Self::Count(0),
            Accumulator::First(_) => Self::First(None),
        }
    }

    fn update(&mut self, acc: &Accumulator, doc: &BsonDocument) {
        match (self, acc) {
            (Self::Sum(total), Accumulator::Sum(expr)) => {
                if let Some(v) = expr.eval(doc) {
                    *total = total.add(&v);
                }
            }
            (Self::Count(n), Accumulator::Count) => *n += 1,
            (Self::First(slot @ None), Accumulator::First(expr)) => *slot = expr.eval(doc),
            _ => {}
        }
    }

    fn finish(self) -> Bson {
        match self {
            Self::Sum(total) => total.into_bson(),
            Self::Count(n) => i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32),
            Self::First(v) => v.unwrap_or(Bson::Null),
        }
    }
}

/// Buckets `docs` by the group key and folds each bucket through the accumulators.
/// One output document per distinct key, in the order keys were first seen.
pub(crate) fn run(docs: Vec<BsonDocument>, spec: &GroupSpec) -> Vec<BsonDocument> {
    let mut slots: HashMap<ValueKey, usize> = HashMap::new();
    let mut buckets: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in &docs {
        let key = spec.key.eval(doc).unwrap_or(Bson::Null);
        let slot = *slots.entry(ValueKey::of(&key)).or_insert_with(|| {
            buckets.push((key, spec.fields.iter().map(|(_, acc)| AccState::start(acc)).collect()));
            buckets.len() - 1
        });
        let states = &mut buckets[slot].1;
        for ((_, acc), state) in spec.fields.iter().zip(states.iter_mut()) {
            state.update(acc, doc);
        }
    }
    log::debug!("group folded {} documents into {} buckets", docs.len(), buckets.len());
    buckets
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key);
            for ((name, _), state) in spec.fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect()
}
