//! Document model: stored records, field paths, and value ordering/equality.

mod compare;
mod core;
mod key;
mod path;

pub(crate) use compare::as_f64;
pub use compare::{compare_bson, compare_in_class, type_class, values_equal, TypeClass};
pub use core::Document;
pub use key::ValueKey;
pub use path::{copy_path, remove_path, resolve, resolve_present, resolve_strict, set_path, FieldPath, MAX_PATH_DEPTH};
