use bson::Bson;
use std::cmp::Ordering;

/// Canonical comparison classes, in sort order. Values of different classes never
/// satisfy a range predicate; sorting orders them by class first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeClass {
    MinKey,
    Null,
    Number,
    String,
    Document,
    Array,
    Binary,
    ObjectId,
    Boolean,
    DateTime,
    Timestamp,
    Regex,
    Other,
    MaxKey,
}

#[must_use]
pub fn type_class(v: &Bson) -> TypeClass {
    match v {
        Bson::MinKey => TypeClass::MinKey,
        Bson::Null | Bson::Undefined => TypeClass::Null,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => {
            TypeClass::Number
        }
        Bson::String(_) | Bson::Symbol(_) => TypeClass::String,
        Bson::Document(_) => TypeClass::Document,
        Bson::Array(_) => TypeClass::Array,
        Bson::Binary(_) => TypeClass::Binary,
        Bson::ObjectId(_) => TypeClass::ObjectId,
        Bson::Boolean(_) => TypeClass::Boolean,
        Bson::DateTime(_) => TypeClass::DateTime,
        Bson::Timestamp(_) => TypeClass::Timestamp,
        Bson::RegularExpression(_) => TypeClass::Regex,
        Bson::MaxKey => TypeClass::MaxKey,
        _ => TypeClass::Other,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return x.cmp(&y);
    }
    let x = as_f64(a).unwrap_or(f64::NAN);
    let y = as_f64(b).unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

/// Compares two values known to share a [`TypeClass`].
#[must_use]
pub fn compare_in_class(a: &Bson, b: &Bson) -> Ordering {
    match (a, b) {
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            x.timestamp_millis().cmp(&y.timestamp_millis())
        }
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            let mut left = x.iter();
            let mut right = y.iter();
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some((ka, va)), Some((kb, vb))) => {
                        let ord = compare_bson(va, vb).then_with(|| ka.cmp(kb));
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            }
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (va, vb) in x.iter().zip(y.iter()) {
                let ord = compare_bson(va, vb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ if type_class(a) == TypeClass::Number => compare_numbers(a, b),
        _ => format!("{a:?}").cmp(&format!("{b:?}")),
    }
}

/// Total order over all values: by type class, then within the class.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (ca, cb) = (type_class(a), type_class(b));
    if ca != cb {
        return ca.cmp(&cb);
    }
    compare_in_class(a, b)
}

/// Value equality: numbers compare across representations (`1 == 1.0`), documents
/// and arrays compare structurally.
#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare_bson(a, b) == Ordering::Equal
}
