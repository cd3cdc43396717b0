use std::path::PathBuf;

/// Programmatic form of the CLI subcommands.
#[derive(Debug, Clone)]
pub enum Command {
    /// Run a JSON pipeline (array of stage documents) over a collection.
    Aggregate {
        collection: String,
        pipeline_json: String,
        /// RFC 3339 instant bound to `$$NOW`.
        now: Option<String>,
    },
    /// Insert one document (JSON object) and report its id.
    Insert {
        collection: String,
        json: String,
    },
    /// Load a seed file of the form `{"collection": [documents]}`.
    Load {
        file: PathBuf,
    },
    ColList,
    Info,
    Metrics,
}
