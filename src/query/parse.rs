use bson::{Bson, DateTime, Document as BsonDocument};

use super::types::{CmpOp, Filter, MAX_IN_SET};
use crate::document::FieldPath;
use crate::errors::DbError;
use crate::utils::time::{DateUnit, shift};

/// Bindings available while a descriptor is turned into a [`Filter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext {
    /// Instant bound to `$$NOW`. Unset means `$$NOW` is rejected.
    pub now: Option<DateTime>,
}

const NOW_VAR: &str = "$$NOW";

/// Parses a `$match` body such as `{"status": "shipped", "total_value": {"$gte": 300}}`.
///
/// # Errors
/// Returns a human-readable reason for unknown operators, malformed paths, oversized
/// `$in` sets, or an unbound `$$NOW`.
pub fn parse_filter(body: &BsonDocument, ctx: &ParseContext) -> Result<Filter, String> {
    let mut clauses = Vec::with_capacity(body.len());
    for (key, value) in body {
        clauses.push(match key.as_str() {
            "$and" => Filter::And(parse_list(key, value, ctx)?),
            "$or" => Filter::Or(parse_list(key, value, ctx)?),
            "$nor" => Filter::Nor(parse_list(key, value, ctx)?),
            k if k.starts_with('$') => return Err(format!("unknown top-level operator {k}")),
            field => parse_field(FieldPath::parse(field)?, value, ctx)?,
        });
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

/// Parses a JSON `$match` body (extended JSON values such as `{"$oid": ..}` and
/// `{"$date": ..}` are honored).
///
/// # Errors
/// `InvalidJson` for malformed input, `QueryError` for an invalid filter.
pub fn parse_filter_json(json: &str, ctx: &ParseContext) -> Result<Filter, DbError> {
    let body = crate::utils::json::parse_document(json)?;
    parse_filter(&body, ctx).map_err(DbError::QueryError)
}

fn parse_list(op: &str, value: &Bson, ctx: &ParseContext) -> Result<Vec<Filter>, String> {
    let Bson::Array(items) = value else {
        return Err(format!("{op} expects an array of filters"));
    };
    if items.is_empty() {
        return Err(format!("{op} needs at least one filter"));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d, ctx),
            _ => Err(format!("{op} entries must be documents")),
        })
        .collect()
}

fn is_operator_doc(d: &BsonDocument) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_field(path: FieldPath, value: &Bson, ctx: &ParseContext) -> Result<Filter, String> {
    match value {
        Bson::Document(ops) if is_operator_doc(ops) => parse_operators(&path, ops, ctx),
        other => Ok(Filter::Cmp { path, op: CmpOp::Eq, value: bind(other, ctx)? }),
    }
}

fn parse_operators(path: &FieldPath, ops: &BsonDocument, ctx: &ParseContext) -> Result<Filter, String> {
    let mut clauses = Vec::with_capacity(ops.len());
    #[cfg(feature = "regex")]
    let case_insensitive = match ops.get("$options") {
        Some(Bson::String(o)) => o.contains('i'),
        Some(_) => return Err("$options must be a string".into()),
        None => false,
    };
    for (op, arg) in ops {
        let clause = match op.as_str() {
            "$eq" => cmp(path, CmpOp::Eq, arg, ctx)?,
            "$ne" => cmp(path, CmpOp::Ne, arg, ctx)?,
            "$gt" => cmp(path, CmpOp::Gt, arg, ctx)?,
            "$gte" => cmp(path, CmpOp::Gte, arg, ctx)?,
            "$lt" => cmp(path, CmpOp::Lt, arg, ctx)?,
            "$lte" => cmp(path, CmpOp::Lte, arg, ctx)?,
            "$in" => Filter::In { path: path.clone(), values: value_set(op, arg, ctx)? },
            "$nin" => Filter::Nin { path: path.clone(), values: value_set(op, arg, ctx)? },
            "$exists" => Filter::Exists { path: path.clone(), exists: truthy(arg) },
            "$size" => Filter::Size { path: path.clone(), len: array_len(arg)? },
            "$not" => match arg {
                Bson::Document(inner) if is_operator_doc(inner) => {
                    Filter::Not(Box::new(parse_operators(path, inner, ctx)?))
                }
                _ => return Err("$not expects an operator document".into()),
            },
            #[cfg(feature = "regex")]
            "$regex" => match arg {
                Bson::String(pattern) => {
                    let regex = regex::RegexBuilder::new(pattern)
                        .case_insensitive(case_insensitive)
                        .build()
                        .map_err(|e| format!("bad $regex: {e}"))?;
                    Filter::Regex { path: path.clone(), regex }
                }
                _ => return Err("$regex expects a string pattern".into()),
            },
            #[cfg(feature = "regex")]
            "$options" => continue,
            other => return Err(format!("unknown operator {other} on {path}")),
        };
        clauses.push(clause);
    }
    Ok(if clauses.len() == 1 { clauses.remove(0) } else { Filter::And(clauses) })
}

fn cmp(path: &FieldPath, op: CmpOp, arg: &Bson, ctx: &ParseContext) -> Result<Filter, String> {
    Ok(Filter::Cmp { path: path.clone(), op, value: bind(arg, ctx)? })
}

fn value_set(op: &str, arg: &Bson, ctx: &ParseContext) -> Result<Vec<Bson>, String> {
    let Bson::Array(items) = arg else {
        return Err(format!("{op} expects an array"));
    };
    if items.len() > MAX_IN_SET {
        return Err(format!("{op} accepts at most {MAX_IN_SET} values"));
    }
    items.iter().map(|v| bind(v, ctx)).collect()
}

fn array_len(arg: &Bson) -> Result<usize, String> {
    let n = match arg {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        Bson::Double(f) if f.fract() == 0.0 => crate::utils::num::f64_to_i64(*f),
        _ => return Err("$size expects a whole number".into()),
    };
    usize::try_from(n).map_err(|_| "$size must not be negative".to_string())
}

fn truthy(arg: &Bson) -> bool {
    match arg {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

/// Substitutes `$$NOW` with the bound instant and folds `$dateSubtract`/`$dateAdd`
/// over constant dates; every other value is taken literally.
pub(crate) fn bind(value: &Bson, ctx: &ParseContext) -> Result<Bson, String> {
    match value {
        Bson::String(s) if s == NOW_VAR => ctx
            .now
            .map(Bson::DateTime)
            .ok_or_else(|| "$$NOW used without a reference instant".to_string()),
        Bson::Document(d) => match date_arith_call(d) {
            Some((op, args)) => fold_date_arith(op, args, ctx).map(Bson::DateTime),
            None => Ok(value.clone()),
        },
        other => Ok(other.clone()),
    }
}

/// `{"$dateSubtract": {..}}` or `{"$dateAdd": {..}}`, split into operator and arguments.
pub(crate) fn date_arith_call(d: &BsonDocument) -> Option<(&str, &BsonDocument)> {
    if d.len() != 1 {
        return None;
    }
    match d.iter().next()? {
        (op, Bson::Document(args)) if op == "$dateSubtract" || op == "$dateAdd" => Some((op.as_str(), args)),
        _ => None,
    }
}

fn fold_date_arith(op: &str, args: &BsonDocument, ctx: &ParseContext) -> Result<DateTime, String> {
    if let Some(key) = args.keys().find(|k| !matches!(k.as_str(), "startDate" | "unit" | "amount")) {
        return Err(format!("{op} does not take {key}"));
    }
    let start = match args.get("startDate").map(|v| bind(v, ctx)).transpose()? {
        Some(Bson::DateTime(d)) => d,
        Some(_) => return Err(format!("{op}.startDate must be a date or $$NOW")),
        None => return Err(format!("{op} needs startDate")),
    };
    let unit: DateUnit = match args.get("unit") {
        Some(Bson::String(u)) => u.parse()?,
        _ => return Err(format!("{op}.unit must be a string")),
    };
    let amount = match args.get("amount") {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        _ => return Err(format!("{op}.amount must be an integer")),
    };
    let signed = if op == "$dateSubtract" { amount.checked_neg() } else { Some(amount) };
    signed
        .and_then(|n| shift(start, unit, n))
        .ok_or_else(|| format!("{op} result is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::eval_filter;
    use bson::{doc, oid::ObjectId};

    fn parse(body: BsonDocument) -> Filter {
        parse_filter(&body, &ParseContext::default()).unwrap()
    }

    #[test]
    fn implicit_equality_on_object_ids() {
        let oid = ObjectId::parse_str("67320c549ec744648a0d8190").unwrap();
        let f = parse(doc! {"customer_id": oid});
        assert!(eval_filter(&doc! {"customer_id": oid}, &f));
        assert!(!eval_filter(&doc! {"customer_id": ObjectId::new()}, &f));
    }

    #[test]
    fn operator_documents_combine_with_and() {
        let f = parse(doc! {"total_value": {"$gt": 100, "$lte": 800}, "status": {"$ne": "pending"}});
        assert!(eval_filter(&doc! {"total_value": 800, "status": "shipped"}, &f));
        assert!(!eval_filter(&doc! {"total_value": 1550, "status": "shipped"}, &f));
        assert!(!eval_filter(&doc! {"total_value": 300, "status": "pending"}, &f));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn regex_is_compiled_once_with_options() {
        let f = parse(doc! {"name": {"$regex": "^jo", "$options": "i"}});
        assert!(matches!(&f, Filter::Regex { regex, .. } if regex.as_str() == "^jo"));
        assert!(eval_filter(&doc! {"name": "John Doe"}, &f));
        assert!(!eval_filter(&doc! {"name": "Bob"}, &f));
        let bad = doc! {"name": {"$regex": "("}};
        assert!(parse_filter(&bad, &ParseContext::default()).unwrap_err().contains("bad $regex"));
    }

    #[test]
    fn date_subtract_folds_against_now() {
        let now = crate::utils::time::parse_instant("2023-07-20T00:00:00Z").unwrap();
        let ctx = ParseContext { now: Some(now) };
        let body = doc! {"order_date": {"$gte": {"$dateSubtract": {"startDate": "$$NOW", "unit": "month", "amount": 1}}}};
        let f = parse_filter(&body, &ctx).unwrap();
        let june_21 = crate::utils::time::parse_instant("2023-06-21T00:00:00Z").unwrap();
        let june_19 = crate::utils::time::parse_instant("2023-06-19T00:00:00Z").unwrap();
        assert!(eval_filter(&doc! {"order_date": june_21}, &f));
        assert!(!eval_filter(&doc! {"order_date": june_19}, &f));

        assert!(parse_filter(&body, &ParseContext::default()).unwrap_err().contains("$$NOW"));
        let bad_unit = doc! {"d": {"$lt": {"$dateAdd": {"startDate": "$$NOW", "unit": "fortnight", "amount": 1}}}};
        assert!(parse_filter(&bad_unit, &ctx).unwrap_err().contains("fortnight"));
        let extra = doc! {"d": {"$lt": {"$dateAdd": {"startDate": "$$NOW", "unit": "day", "amount": 1, "tz": "UTC"}}}};
        assert!(parse_filter(&extra, &ctx).unwrap_err().contains("tz"));
    }

    #[test]
    fn logical_and_size_operators() {
        let f = parse(doc! {"$or": [{"orders": {"$size": 0}}, {"vip": true}]});
        assert!(eval_filter(&doc! {"orders": []}, &f));
        assert!(eval_filter(&doc! {"orders": [1], "vip": true}, &f));
        assert!(!eval_filter(&doc! {"orders": [1]}, &f));

        let f = parse(doc! {"status": {"$not": {"$in": ["pending", "processing"]}}});
        assert!(eval_filter(&doc! {"status": "shipped"}, &f));
        assert!(!eval_filter(&doc! {"status": "pending"}, &f));
    }

    #[test]
    fn nested_document_without_operators_is_equality() {
        let f = parse(doc! {"address": {"city": "Springfield", "zipcode": "12345"}});
        assert!(eval_filter(&doc! {"address": {"city": "Springfield", "zipcode": "12345"}}, &f));
        assert!(!eval_filter(&doc! {"address": {"zipcode": "12345", "city": "Springfield"}}, &f));
    }

    #[test]
    fn now_requires_a_bound_instant() {
        let body = doc! {"order_date": {"$gte": "$$NOW"}};
        let err = parse_filter(&body, &ParseContext::default()).unwrap_err();
        assert!(err.contains("$$NOW"));
        let now = DateTime::from_millis(1_700_000_000_000);
        let f = parse_filter(&body, &ParseContext { now: Some(now) }).unwrap();
        assert!(eval_filter(&doc! {"order_date": DateTime::from_millis(1_700_000_000_001)}, &f));
    }

    #[test]
    fn rejects_unknown_operators_and_bad_arguments() {
        let ctx = ParseContext::default();
        assert!(parse_filter(&doc! {"a": {"$near": 1}}, &ctx).is_err());
        assert!(parse_filter(&doc! {"$where": "x"}, &ctx).is_err());
        assert!(parse_filter(&doc! {"a": {"$size": -1}}, &ctx).is_err());
        assert!(parse_filter(&doc! {"a": {"$in": 3}}, &ctx).is_err());
        assert!(parse_filter(&doc! {"$and": []}, &ctx).is_err());
        assert!(parse_filter(&doc! {"a..b": 1}, &ctx).is_err());
    }

    #[test]
    fn json_bodies_accept_extended_json() {
        let f = parse_filter_json(
            r#"{"order_date": {"$gte": {"$date": "2023-06-05T14:00:00Z"}}}"#,
            &ParseContext::default(),
        )
        .unwrap();
        let june = DateTime::parse_rfc3339_str("2023-06-10T14:00:00Z").unwrap();
        assert!(eval_filter(&doc! {"order_date": june}, &f));
        assert!(matches!(
            parse_filter_json("{not json", &ParseContext::default()),
            Err(DbError::InvalidJson(_))
        ));
    }
}
