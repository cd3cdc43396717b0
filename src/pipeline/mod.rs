//! Aggregation pipelines: stage descriptors, parsing of MongoDB-shaped stage documents,
//! and the lazy executor.

mod core;
mod cursor;
mod exec;
mod expr;
mod group;
mod lookup;
mod parse;
mod project;
mod sort;
mod types;
mod unwind;

pub use core::Pipeline;
pub use cursor::Cursor;
pub use exec::{DocStream, Snapshots};
pub use expr::{Expression, parse_expression};
pub use types::{
    Accumulator, GroupSpec, LookupSpec, ProjectField, ProjectSpec, Stage, StageKind, UnwindSpec,
};
