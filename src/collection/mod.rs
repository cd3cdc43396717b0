mod core;
mod ops;

pub use core::Collection;
