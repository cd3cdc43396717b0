use serde::Serialize;
use std::io::Write;

use super::command::Command;
use super::util::load_data;
use crate::utils::json::{document_to_json, parse_document};
use crate::utils::time::parse_instant;
use crate::{AggregateOptions, Database};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

#[derive(Debug, Serialize)]
struct CollectionInfo {
    name: String,
    documents: usize,
}

#[derive(Debug, Serialize)]
struct InfoReport {
    version: &'static str,
    features: Vec<&'static str>,
    collections: Vec<CollectionInfo>,
}

fn info_report(db: &Database) -> InfoReport {
    let collections = db
        .list_collection_names()
        .into_iter()
        .map(|name| {
            let documents = db.get_collection(&name).map_or(0, |c| c.len());
            CollectionInfo { name, documents }
        })
        .collect();
    InfoReport {
        version: env!("CARGO_PKG_VERSION"),
        features: crate::COMPILED_FEATURES.to_vec(),
        collections,
    }
}

/// Executes `cmd` against `db`, writing its output to `out` in the requested mode.
///
/// # Errors
/// Any database or parse error, and write failures on `out`.
pub fn run_with_format(
    db: &Database,
    cmd: Command,
    mode: OutputMode,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Aggregate { collection, pipeline_json, now } => {
            let opts = AggregateOptions { now: now.as_deref().map(parse_instant).transpose()? };
            let rows: Vec<_> = db.aggregate_json(&collection, &pipeline_json, &opts)?.collect();
            match mode {
                OutputMode::Json => {
                    let arr: Vec<_> = rows.iter().map(document_to_json).collect();
                    writeln!(out, "{}", serde_json::Value::Array(arr))?;
                }
                OutputMode::Plain => {
                    for row in &rows {
                        writeln!(out, "{}", document_to_json(row))?;
                    }
                }
                OutputMode::Human => {
                    for row in &rows {
                        writeln!(out, "{}", serde_json::to_string_pretty(&document_to_json(row))?)?;
                    }
                    writeln!(out, "({} documents)", rows.len())?;
                }
            }
            Ok(())
        }
        Command::Insert { collection, json } => {
            let id = db.insert_one(&collection, parse_document(&json)?)?;
            match mode {
                OutputMode::Json => {
                    let json = serde_json::json!({"action": "inserted", "collection": collection, "_id": id.to_hex()});
                    writeln!(out, "{json}")?;
                }
                OutputMode::Plain => writeln!(out, "{}", id.to_hex())?,
                OutputMode::Human => writeln!(out, "inserted collection={collection} _id={}", id.to_hex())?,
            }
            Ok(())
        }
        Command::Load { file } => {
            let n = load_data(db, &file)?;
            match mode {
                OutputMode::Json => {
                    let json = serde_json::json!({"action": "loaded", "file": file.display().to_string(), "documents": n});
                    writeln!(out, "{json}")?;
                }
                OutputMode::Plain => writeln!(out, "{n}")?,
                OutputMode::Human => writeln!(out, "loaded documents={n} file={}", file.display())?,
            }
            Ok(())
        }
        Command::ColList => {
            let names = db.list_collection_names();
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string(&names)?)?,
                OutputMode::Plain | OutputMode::Human => {
                    for name in names {
                        writeln!(out, "{name}")?;
                    }
                }
            }
            Ok(())
        }
        Command::Info => {
            let report = info_report(db);
            match mode {
                OutputMode::Plain => writeln!(
                    out,
                    "version={} collections={} documents={}",
                    report.version,
                    report.collections.len(),
                    report.collections.iter().map(|c| c.documents).sum::<usize>()
                )?,
                OutputMode::Json | OutputMode::Human => {
                    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
                }
            }
            Ok(())
        }
        Command::Metrics => {
            let text = crate::telemetry::metrics_text();
            match mode {
                OutputMode::Json => {
                    let map: serde_json::Map<String, serde_json::Value> = text
                        .lines()
                        .filter_map(|l| l.split_once(' '))
                        .filter_map(|(k, v)| Some((k.to_owned(), v.parse::<u64>().ok()?.into())))
                        .collect();
                    writeln!(out, "{}", serde_json::Value::Object(map))?;
                }
                OutputMode::Plain | OutputMode::Human => write!(out, "{text}")?,
            }
            Ok(())
        }
    }
}

/// Runs `cmd` with human-readable output on stdout.
///
/// # Errors
/// See [`run_with_format`].
pub fn run(db: &Database, cmd: Command) -> Result<(), Box<dyn std::error::Error>> {
    run_with_format(db, cmd, OutputMode::Human, &mut std::io::stdout().lock())
}
