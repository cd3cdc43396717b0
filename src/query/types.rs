use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::document::FieldPath;

// Upper bounds on descriptor sizes, checked when a pipeline is built.
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: FieldPath,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: FieldPath, order: Order) -> Self {
        Self { field, order }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A predicate over one document. Clauses that meet a missing field or a value of an
/// incomparable type evaluate to false; they never abort evaluation.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: FieldPath, exists: bool },
    In { path: FieldPath, values: Vec<Bson> },
    Nin { path: FieldPath, values: Vec<Bson> },
    Cmp { path: FieldPath, op: CmpOp, value: Bson },
    Size { path: FieldPath, len: usize },
    #[cfg(feature = "regex")]
    Regex { path: FieldPath, regex: regex::Regex },
}

impl Filter {
    /// Convenience constructor for a single comparison clause.
    ///
    /// # Errors
    /// Returns the path error text when `path` is malformed.
    pub fn cmp(path: &str, op: CmpOp, value: impl Into<Bson>) -> Result<Self, String> {
        Ok(Self::Cmp { path: FieldPath::parse(path)?, op, value: value.into() })
    }
}
