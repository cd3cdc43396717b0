use std::fmt;

use super::expr::Expression;
use crate::document::FieldPath;
use crate::query::{Filter, SortSpec};

/// One step of a pipeline. Stages run strictly in the order given.
#[derive(Debug, Clone)]
pub enum Stage {
    Filter(Filter),
    Group(GroupSpec),
    Lookup(LookupSpec),
    Unwind(UnwindSpec),
    Project(ProjectSpec),
    Sort(Vec<SortSpec>),
    /// Keeps the first `n` documents; `n <= 0` keeps none.
    Limit(i64),
    Skip(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Filter,
    Group,
    Lookup,
    Unwind,
    Project,
    Sort,
    Limit,
    Skip,
}

impl Stage {
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Filter(_) => StageKind::Filter,
            Self::Group(_) => StageKind::Group,
            Self::Lookup(_) => StageKind::Lookup,
            Self::Unwind(_) => StageKind::Unwind,
            Self::Project(_) => StageKind::Project,
            Self::Sort(_) => StageKind::Sort,
            Self::Limit(_) => StageKind::Limit,
            Self::Skip(_) => StageKind::Skip,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Filter => "filter",
            Self::Group => "group",
            Self::Lookup => "lookup",
            Self::Unwind => "unwind",
            Self::Project => "project",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Skip => "skip",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Numeric total; non-numeric and missing values contribute nothing.
    Sum(Expression),
    Count,
    /// First non-missing value in arrival order.
    First(Expression),
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub key: Expression,
    /// Output fields in declaration order.
    pub fields: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    #[must_use]
    pub fn new(key: Expression) -> Self {
        Self { key, fields: Vec::new() }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, acc: Accumulator) -> Self {
        self.fields.push((name.into(), acc));
        self
    }
}

/// Left-outer equality join against another collection.
#[derive(Debug, Clone)]
pub struct LookupSpec {
    pub from: String,
    pub local_field: FieldPath,
    pub foreign_field: FieldPath,
    pub as_field: FieldPath,
}

impl LookupSpec {
    /// # Errors
    /// Returns the path error text when one of the paths is malformed.
    pub fn new(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Result<Self, String> {
        Ok(Self {
            from: from.to_owned(),
            local_field: FieldPath::parse(local_field)?,
            foreign_field: FieldPath::parse(foreign_field)?,
            as_field: FieldPath::parse(as_field)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnwindSpec {
    pub path: FieldPath,
    /// Emit documents whose array is empty (with the field removed) instead of dropping them.
    pub preserve_null_and_empty: bool,
    /// Where to write the element index (Int64), if anywhere.
    pub include_array_index: Option<FieldPath>,
}

impl UnwindSpec {
    #[must_use]
    pub fn new(path: FieldPath) -> Self {
        Self { path, preserve_null_and_empty: false, include_array_index: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Expr(Expression),
}

/// Reshapes each document.
///
/// With `include_all == false` the output holds only the listed fields, in listing
/// order (`_id` only when listed); an included path through an array keeps one
/// subdocument per element. With `include_all == true` the input is kept and the
/// listed fields override or remove.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub include_all: bool,
    pub fields: Vec<(FieldPath, ProjectField)>,
}

impl ProjectSpec {
    #[must_use]
    pub fn inclusion() -> Self {
        Self { include_all: false, fields: Vec::new() }
    }

    #[must_use]
    pub fn include_all() -> Self {
        Self { include_all: true, fields: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, path: FieldPath, field: ProjectField) -> Self {
        self.fields.push((path, field));
        self
    }
}
