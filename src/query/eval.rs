use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, Order, SortSpec, MAX_IN_SET};
use crate::document::{compare_bson, compare_in_class, resolve, resolve_present, type_class, values_equal};

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => resolve_present(doc, path).is_some() == *exists,
        Filter::In { path, values } => is_in_set(resolve_present(doc, path).as_ref(), values),
        Filter::Nin { path, values } => !is_in_set(resolve_present(doc, path).as_ref(), values),
        Filter::Cmp { path, op, value } => {
            let resolved = resolve_present(doc, path);
            match op {
                CmpOp::Eq => matches_eq(resolved.as_ref(), value),
                CmpOp::Ne => !matches_eq(resolved.as_ref(), value),
                CmpOp::Gt => matches_range(resolved.as_ref(), value, |o| o == Ordering::Greater),
                CmpOp::Gte => matches_range(resolved.as_ref(), value, |o| o != Ordering::Less),
                CmpOp::Lt => matches_range(resolved.as_ref(), value, |o| o == Ordering::Less),
                CmpOp::Lte => matches_range(resolved.as_ref(), value, |o| o != Ordering::Greater),
            }
        }
        Filter::Size { path, len } => {
            matches!(resolve_present(doc, path), Some(Bson::Array(items)) if items.len() == *len)
        }
        #[cfg(feature = "regex")]
        Filter::Regex { path, regex } => candidates(resolve_present(doc, path).as_ref())
            .iter()
            .any(|v| matches!(v, Bson::String(s) if regex.is_match(s))),
    }
}

/// The value itself plus, for arrays, each element: a clause matches when any
/// candidate satisfies it.
fn candidates(resolved: Option<&Bson>) -> Vec<&Bson> {
    let Some(v) = resolved else {
        return Vec::new();
    };
    match v {
        Bson::Array(items) => std::iter::once(v).chain(items.iter()).collect(),
        _ => vec![v],
    }
}

fn matches_eq(resolved: Option<&Bson>, literal: &Bson) -> bool {
    match resolved {
        None => matches!(literal, Bson::Null),
        Some(_) => candidates(resolved).into_iter().any(|v| values_equal(v, literal)),
    }
}

fn matches_range(resolved: Option<&Bson>, literal: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let class = type_class(literal);
    candidates(resolved)
        .into_iter()
        .any(|v| type_class(v) == class && accept(compare_in_class(v, literal)))
}

fn is_in_set(resolved: Option<&Bson>, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| matches_eq(resolved, x))
}

/// Orders two documents by `sort`; missing fields sort as `null`.
pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let va = resolve(a, &s.field).unwrap_or(Bson::Null);
        let vb = resolve(b, &s.field).unwrap_or(Bson::Null);
        let ord = compare_bson(&va, &vb);
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}
