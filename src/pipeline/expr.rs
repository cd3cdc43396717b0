use bson::{Bson, Document as BsonDocument};

use crate::document::{FieldPath, resolve};
use crate::query::{ParseContext, bind, date_arith_call};

/// A value computed per input document: a field reference, the whole record, a
/// constant, or an object built from nested expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `$$ROOT`: the entire input document.
    Root,
    Field(FieldPath),
    Literal(Bson),
    Object(Vec<(String, Expression)>),
}

impl Expression {
    /// Shorthand for a field reference, accepting `a.b` or `$a.b`.
    ///
    /// # Errors
    /// Returns the path error text when the reference is malformed.
    pub fn field(reference: &str) -> Result<Self, String> {
        FieldPath::from_ref(reference).map(Self::Field)
    }

    /// Evaluates against `doc`. `None` marks a missing value; object expressions drop
    /// members that evaluate to missing.
    #[must_use]
    pub fn eval(&self, doc: &BsonDocument) -> Option<Bson> {
        match self {
            Self::Root => Some(Bson::Document(doc.clone())),
            Self::Field(path) => resolve(doc, path),
            Self::Literal(v) => Some(v.clone()),
            Self::Object(fields) => {
                let mut out = BsonDocument::new();
                for (name, expr) in fields {
                    if let Some(v) = expr.eval(doc) {
                        out.insert(name.clone(), v);
                    }
                }
                Some(Bson::Document(out))
            }
        }
    }
}

/// Parses an expression descriptor: `"$path"`, `"$$ROOT"`, `"$$NOW"`, `{"$literal": v}`,
/// `$dateSubtract`/`$dateAdd` over constant dates, an object of nested expressions, or
/// any other value as a constant.
///
/// # Errors
/// Unknown `$$` variables, unsupported `$` operators, malformed paths, or an unbound `$$NOW`.
pub fn parse_expression(value: &Bson, ctx: &ParseContext) -> Result<Expression, String> {
    match value {
        Bson::String(s) if s == "$$ROOT" || s == "$$CURRENT" => Ok(Expression::Root),
        Bson::String(s) if s == "$$NOW" => bind(value, ctx).map(Expression::Literal),
        Bson::String(s) if s.starts_with("$$") => Err(format!("unknown variable {s}")),
        Bson::String(s) if s.starts_with('$') => Expression::field(s),
        Bson::Document(d) => match d.iter().next() {
            Some((k, v)) if k == "$literal" && d.len() == 1 => Ok(Expression::Literal(v.clone())),
            _ if date_arith_call(d).is_some() => bind(value, ctx).map(Expression::Literal),
            Some((k, _)) if k.starts_with('$') => Err(format!("unsupported expression operator {k}")),
            _ => d
                .iter()
                .map(|(k, v)| {
                    if k.contains('.') {
                        return Err(format!("object expression key {k:?} must not contain '.'"));
                    }
                    Ok((k.clone(), parse_expression(v, ctx)?))
                })
                .collect::<Result<_, _>>()
                .map(Expression::Object),
        },
        other => Ok(Expression::Literal(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{DateTime, bson, doc};

    fn parse(v: Bson) -> Result<Expression, String> {
        parse_expression(&v, &ParseContext::default())
    }

    #[test]
    fn field_references_resolve_nested_paths() {
        let e = parse(bson!("$customer.name")).unwrap();
        let d = doc! {"customer": {"name": "John Doe"}};
        assert_eq!(e.eval(&d), Some(Bson::String("John Doe".into())));
        assert_eq!(e.eval(&doc! {}), None);
    }

    #[test]
    fn root_captures_the_whole_record() {
        let d = doc! {"order_id": "ORD123456", "total_value": 1550};
        assert_eq!(parse(bson!("$$ROOT")).unwrap().eval(&d), Some(Bson::Document(d.clone())));
    }

    #[test]
    fn literals_and_escaped_dollars() {
        assert_eq!(parse(bson!(1)).unwrap(), Expression::Literal(Bson::Int32(1)));
        let e = parse(bson!({"$literal": "$notAPath"})).unwrap();
        assert_eq!(e.eval(&doc! {}), Some(Bson::String("$notAPath".into())));
    }

    #[test]
    fn object_expressions_drop_missing_members() {
        let e = parse(bson!({"city": "$address.city", "zip": "$address.zipcode"})).unwrap();
        let d = doc! {"address": {"city": "Springfield"}};
        assert_eq!(e.eval(&d), Some(Bson::Document(doc! {"city": "Springfield"})));
    }

    #[test]
    fn now_binds_to_the_reference_instant() {
        assert!(parse(bson!("$$NOW")).unwrap_err().contains("$$NOW"));
        let now = DateTime::from_millis(1_690_000_000_000);
        let e = parse_expression(&bson!("$$NOW"), &ParseContext { now: Some(now) }).unwrap();
        assert_eq!(e, Expression::Literal(Bson::DateTime(now)));
    }

    #[test]
    fn date_arithmetic_folds_to_a_literal() {
        let now = DateTime::from_millis(1_690_000_000_000);
        let descriptor = bson!({"$dateAdd": {"startDate": "$$NOW", "unit": "second", "amount": 5}});
        let e = parse_expression(&descriptor, &ParseContext { now: Some(now) }).unwrap();
        assert_eq!(e, Expression::Literal(Bson::DateTime(DateTime::from_millis(1_690_000_005_000))));
        assert!(parse(descriptor).is_err());
    }

    #[test]
    fn rejects_unknown_variables_and_operators() {
        assert!(parse(bson!("$$USER")).is_err());
        assert!(parse(bson!({"$add": [1, 2]})).is_err());
        assert!(parse(bson!("$")).is_err());
    }
}
