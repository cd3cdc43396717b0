//! Utility modules: logging setup, developer traces, JSON and numeric conversions, time.
pub mod devlog;
pub mod json;
pub mod logger;
pub mod num;
pub mod time;
