use bson::{Bson, Document as BsonDocument};

use super::core::Pipeline;
use super::expr::parse_expression;
use super::types::{
    Accumulator, GroupSpec, LookupSpec, ProjectField, ProjectSpec, Stage, StageKind, UnwindSpec,
};
use crate::document::FieldPath;
use crate::errors::DbError;
use crate::query::{Order, ParseContext, SortSpec, parse_filter};

impl Pipeline {
    /// Builds a pipeline from MongoDB-shaped stage documents such as
    /// `{"$group": {"_id": "$status", "order_count": {"$sum": 1}}}`.
    ///
    /// # Errors
    /// `InvalidStage` naming the index of the first malformed stage.
    pub fn from_bson(stages: &[BsonDocument], ctx: &ParseContext) -> Result<Self, DbError> {
        let parsed = stages
            .iter()
            .enumerate()
            .map(|(index, stage)| parse_stage(index, stage, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// Parses a JSON array of stage documents. Extended JSON (`{"$oid": ..}`,
    /// `{"$date": ..}`) is honored inside stage bodies.
    ///
    /// # Errors
    /// `InvalidJson` for malformed JSON, `InvalidStage` for a malformed stage.
    pub fn parse_json(json: &str, ctx: &ParseContext) -> Result<Self, DbError> {
        let stages = crate::utils::json::parse_document_array(json)?;
        Self::from_bson(&stages, ctx)
    }
}

fn parse_stage(index: usize, stage: &BsonDocument, ctx: &ParseContext) -> Result<Stage, DbError> {
    let mut entries = stage.iter();
    let (name, body) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(DbError::stage(index, "stage", "a stage document must have exactly one key")),
    };
    let kind = match name.as_str() {
        "$match" => StageKind::Filter,
        "$group" => StageKind::Group,
        "$lookup" => StageKind::Lookup,
        "$unwind" => StageKind::Unwind,
        "$project" | "$addFields" | "$set" => StageKind::Project,
        "$sort" => StageKind::Sort,
        "$limit" => StageKind::Limit,
        "$skip" => StageKind::Skip,
        other => return Err(DbError::stage(index, other, "unknown stage")),
    };
    let parsed = match kind {
        StageKind::Filter => as_doc(body, name).and_then(|b| parse_filter(b, ctx)).map(Stage::Filter),
        StageKind::Group => as_doc(body, name).and_then(|b| parse_group(b, ctx)).map(Stage::Group),
        StageKind::Lookup => as_doc(body, name).and_then(parse_lookup).map(Stage::Lookup),
        StageKind::Unwind => parse_unwind(body).map(Stage::Unwind),
        StageKind::Project => {
            let include_all = name != "$project";
            as_doc(body, name).and_then(|b| parse_project(b, include_all, ctx)).map(Stage::Project)
        }
        StageKind::Sort => as_doc(body, name).and_then(parse_sort).map(Stage::Sort),
        StageKind::Limit => as_int(body, name).map(Stage::Limit),
        StageKind::Skip => as_int(body, name).and_then(|n| {
            u64::try_from(n).map(Stage::Skip).map_err(|_| "$skip must not be negative".to_string())
        }),
    };
    parsed.map_err(|reason| DbError::stage(index, kind.to_string(), reason))
}

fn as_doc<'a>(body: &'a Bson, name: &str) -> Result<&'a BsonDocument, String> {
    match body {
        Bson::Document(d) => Ok(d),
        _ => Err(format!("{name} expects a document")),
    }
}

fn as_int(body: &Bson, name: &str) -> Result<i64, String> {
    match body {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        Bson::Double(f) if f.fract() == 0.0 => Ok(crate::utils::num::f64_to_i64(*f)),
        _ => Err(format!("{name} expects a whole number")),
    }
}

fn as_str<'a>(body: &'a BsonDocument, key: &str) -> Result<&'a str, String> {
    match body.get(key) {
        Some(Bson::String(s)) => Ok(s),
        Some(_) => Err(format!("'{key}' must be a string")),
        None => Err(format!("missing '{key}'")),
    }
}

fn parse_group(body: &BsonDocument, ctx: &ParseContext) -> Result<GroupSpec, String> {
    let key = body.get("_id").ok_or("missing '_id' group key")?;
    let mut spec = GroupSpec::new(parse_expression(key, ctx)?);
    for (name, acc) in body.iter().filter(|(k, _)| k.as_str() != "_id") {
        spec = spec.field(name.clone(), parse_accumulator(name, acc, ctx)?);
    }
    Ok(spec)
}

fn parse_accumulator(field: &str, acc: &Bson, ctx: &ParseContext) -> Result<Accumulator, String> {
    let Bson::Document(d) = acc else {
        return Err(format!("accumulator for '{field}' must be a document"));
    };
    let mut ops = d.iter();
    let (Some((op, arg)), None) = (ops.next(), ops.next()) else {
        return Err(format!("accumulator for '{field}' must have exactly one operator"));
    };
    match op.as_str() {
        "$sum" => Ok(Accumulator::Sum(parse_expression(arg, ctx)?)),
        "$first" => Ok(Accumulator::First(parse_expression(arg, ctx)?)),
        "$count" => match arg {
            Bson::Document(empty) if empty.is_empty() => Ok(Accumulator::Count),
            _ => Err("$count takes an empty document".into()),
        },
        other => Err(format!("unknown accumulator {other} for '{field}'")),
    }
}

fn parse_lookup(body: &BsonDocument) -> Result<LookupSpec, String> {
    if let Some(k) = body.keys().find(|k| !matches!(k.as_str(), "from" | "localField" | "foreignField" | "as")) {
        return Err(format!("unsupported option '{k}'"));
    }
    LookupSpec::new(
        as_str(body, "from")?,
        as_str(body, "localField")?,
        as_str(body, "foreignField")?,
        as_str(body, "as")?,
    )
}

fn unwind_path(raw: &str) -> Result<FieldPath, String> {
    match raw.strip_prefix('$') {
        Some(path) => FieldPath::parse(path),
        None => Err(format!("unwind path {raw:?} must start with '$'")),
    }
}

fn parse_unwind(body: &Bson) -> Result<UnwindSpec, String> {
    match body {
        Bson::String(raw) => unwind_path(raw).map(UnwindSpec::new),
        Bson::Document(d) => {
            let mut spec = UnwindSpec::new(unwind_path(as_str(d, "path")?)?);
            match d.get("preserveNullAndEmptyArrays") {
                None => {}
                Some(Bson::Boolean(b)) => spec.preserve_null_and_empty = *b,
                Some(_) => return Err("'preserveNullAndEmptyArrays' must be a boolean".into()),
            }
            if d.contains_key("includeArrayIndex") {
                spec.include_array_index = Some(FieldPath::parse(as_str(d, "includeArrayIndex")?)?);
            }
            Ok(spec)
        }
        _ => Err("$unwind expects a path string or a document".into()),
    }
}

/// `1`/`true` includes, `0`/`false` excludes, anything else is an expression.
fn project_field(value: &Bson, ctx: &ParseContext) -> Result<ProjectField, String> {
    Ok(match value {
        Bson::Boolean(true) => ProjectField::Include,
        Bson::Boolean(false) => ProjectField::Exclude,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
            if crate::document::as_f64(value).is_some_and(|f| f == 0.0) {
                ProjectField::Exclude
            } else {
                ProjectField::Include
            }
        }
        other => ProjectField::Expr(parse_expression(other, ctx)?),
    })
}

fn parse_project(body: &BsonDocument, add_fields: bool, ctx: &ParseContext) -> Result<ProjectSpec, String> {
    let mut fields = Vec::with_capacity(body.len());
    for (name, value) in body {
        let path = FieldPath::parse(name)?;
        let field = if add_fields {
            ProjectField::Expr(parse_expression(value, ctx)?)
        } else {
            project_field(value, ctx)?
        };
        fields.push((path, field));
    }
    let include_all = add_fields || fields.iter().all(|(_, f)| *f == ProjectField::Exclude);
    Ok(ProjectSpec { include_all, fields })
}

fn parse_sort(body: &BsonDocument) -> Result<Vec<SortSpec>, String> {
    body.iter()
        .map(|(name, dir)| {
            let order = match as_int(dir, "sort direction") {
                Ok(1) => Order::Asc,
                Ok(-1) => Order::Desc,
                _ => return Err(format!("sort direction for '{name}' must be 1 or -1")),
            };
            Ok(SortSpec::new(FieldPath::parse(name)?, order))
        })
        .collect()
}
