use std::path::Path;

use super::runner::OutputMode;
use crate::Database;
use crate::errors::DbError;
use crate::utils::json::value_to_document_array;

#[must_use]
pub fn parse_output_mode(s: Option<&str>) -> OutputMode {
    match s.map(str::to_ascii_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        Some("plain") => OutputMode::Plain,
        _ => OutputMode::Human,
    }
}

/// Loads `{"customers": [..], "orders": [..]}` (extended JSON) into `db`, one
/// `insert_many` per collection in file order. Returns the number of documents inserted.
///
/// # Errors
/// `Io` when the file cannot be read, `Json` for a syntax error, `InvalidJson` for a
/// wrong shape or bad extended JSON, and any insert error.
pub fn load_data(db: &Database, file: &Path) -> Result<usize, DbError> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| DbError::Io(format!("{}: {e}", file.display())))?;
    let root: serde_json::Value = serde_json::from_str(&text)?;
    let serde_json::Value::Object(collections) = root else {
        return Err(DbError::InvalidJson("seed file must map collection names to arrays".into()));
    };
    let mut total = 0;
    for (name, docs) in collections {
        let docs = value_to_document_array(docs)?;
        total += db.insert_many(&name, docs)?.len();
    }
    log::info!("loaded {total} documents from {}", file.display());
    Ok(total)
}
