use bson::Bson;
use ordered_float::OrderedFloat;

/// Hashable stand-in for a value, agreeing with [`super::values_equal`]: two values get
/// the same key exactly when they compare equal. Used to bucket groups and to index
/// lookup targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
    ObjectId([u8; 12]),
    DateTime(i64),
    Array(Vec<ValueKey>),
    Document(Vec<(String, ValueKey)>),
    Other(String),
}

impl ValueKey {
    #[must_use]
    pub fn of(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Int32(i) => Self::Int(i64::from(*i)),
            Bson::Int64(i) => Self::Int(*i),
            Bson::Double(f) => Self::float(*f),
            Bson::Decimal128(d) => {
                d.to_string().parse::<f64>().map_or_else(|_| Self::Other(d.to_string()), Self::float)
            }
            Bson::String(s) | Bson::Symbol(s) => Self::Str(s.clone()),
            Bson::Boolean(b) => Self::Bool(*b),
            Bson::ObjectId(oid) => Self::ObjectId(oid.bytes()),
            Bson::DateTime(dt) => Self::DateTime(dt.timestamp_millis()),
            Bson::Array(items) => Self::Array(items.iter().map(Self::of).collect()),
            Bson::Document(d) => {
                Self::Document(d.iter().map(|(k, v)| (k.clone(), Self::of(v))).collect())
            }
            other => Self::Other(format!("{other:?}")),
        }
    }

    /// Key for a possibly-missing value; missing buckets with `null`.
    #[must_use]
    pub fn of_resolved(value: Option<&Bson>) -> Self {
        value.map_or(Self::Null, Self::of)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn float(f: f64) -> Self {
        // Integral doubles share the integer key so that 1 and 1.0 group together.
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            Self::Int(f as i64)
        } else {
            Self::Float(OrderedFloat(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::bson;
    use std::collections::HashSet;

    #[test]
    fn numeric_representations_share_a_key() {
        assert_eq!(ValueKey::of(&Bson::Int32(300)), ValueKey::of(&Bson::Double(300.0)));
        assert_eq!(ValueKey::of(&Bson::Int64(300)), ValueKey::of(&Bson::Int32(300)));
        assert_ne!(ValueKey::of(&Bson::Double(0.5)), ValueKey::of(&Bson::Int32(0)));
    }

    #[test]
    fn missing_and_null_share_a_key() {
        assert_eq!(ValueKey::of_resolved(None), ValueKey::of(&Bson::Null));
    }

    #[test]
    fn structural_keys_are_hashable() {
        let mut set = HashSet::new();
        set.insert(ValueKey::of(&bson!({"city": "Springfield", "zip": [1, 2]})));
        set.insert(ValueKey::of(&bson!({"city": "Springfield", "zip": [1.0, 2.0]})));
        set.insert(ValueKey::of(&bson!({"city": "Shelbyville"})));
        assert_eq!(set.len(), 2);
    }
}
