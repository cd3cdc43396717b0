//! `$match` filters: the predicate model, its parser, and evaluation. Also hosts the
//! process-wide aggregation counters.

pub mod telemetry;

mod eval;
mod parse;
mod types;

pub use eval::{compare_docs, eval_filter};
pub(crate) use parse::{bind, date_arith_call};
pub use parse::{ParseContext, parse_filter, parse_filter_json};
pub(crate) use types::{MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS};
pub use types::{CmpOp, Filter, Order, SortSpec};
