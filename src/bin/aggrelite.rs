use aggrelite::cli::{self as prog_cli, AppConfig, Command, OutputMode};
use aggrelite::engine::EngineOptions;
use aggrelite::Database;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aggrelite", version, about = "In-memory aggregation pipeline CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the default locations are searched.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Seed file mapping collection names to document arrays, loaded before the command")]
    data: Option<PathBuf>,
    #[arg(long, help = "Directory for rolling log files; logging is off when unset")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, help = "Output format: human|plain|json")]
    format: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "aggregate", about = "Run a pipeline (JSON array of stages) over a collection")]
    Aggregate {
        #[arg(help = "Source collection")]
        collection: String,
        #[arg(help = "Pipeline JSON file")]
        pipeline_file: Option<PathBuf>,
        #[arg(long, conflicts_with = "pipeline_file", help = "Pipeline as inline JSON")]
        pipeline: Option<String>,
        #[arg(long, help = "RFC 3339 instant bound to $$NOW")]
        now: Option<String>,
    },
    #[command(name = "insert", about = "Insert one document (JSON object)")]
    Insert {
        #[arg(help = "Target collection")]
        collection: String,
        #[arg(help = "Document as JSON")]
        json: String,
    },
    #[command(name = "load", about = "Load an additional seed file")]
    Load {
        #[arg(help = "Seed file path")]
        file: PathBuf,
    },
    #[command(name = "collections", alias = "list-collections", about = "List collection names")]
    ColList,
    #[command(name = "info", about = "Show version, compiled features and collection sizes")]
    Info,
    #[command(name = "metrics", about = "Print aggregation counters")]
    Metrics,
}

fn merge_cli(cfg: AppConfig, cli: &Cli) -> AppConfig {
    AppConfig {
        data: cli.data.clone().or(cfg.data),
        log_dir: cli.log_dir.clone().or(cfg.log_dir),
        log_level: cli.log_level.clone().or(cfg.log_level),
        format: cli.format.clone().or(cfg.format),
        ..cfg
    }
}

fn to_command(cmd: Commands) -> Result<Command, Box<dyn std::error::Error>> {
    Ok(match cmd {
        Commands::Aggregate { collection, pipeline, pipeline_file, now } => {
            let pipeline_json = match (pipeline, pipeline_file) {
                (Some(json), _) => json,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .map_err(|e| format!("{}: {e}", path.display()))?,
                (None, None) => return Err("a pipeline file or --pipeline is required".into()),
            };
            Command::Aggregate { collection, pipeline_json, now }
        }
        Commands::Insert { collection, json } => Command::Insert { collection, json },
        Commands::Load { file } => Command::Load { file },
        Commands::ColList => Command::ColList,
        Commands::Info => Command::Info,
        Commands::Metrics => Command::Metrics,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = merge_cli(prog_cli::load_config(cli.config.as_deref(), |k| std::env::var(k).ok()), &cli);

    if let Some(dir) = &cfg.log_dir {
        aggrelite::utils::logger::configure_logging(Some(dir), cfg.log_level.as_deref(), cfg.log_retention)?;
    }

    let defaults = EngineOptions::default();
    let db = Database::with_options(EngineOptions {
        slow_pipeline_ms: cfg.slow_pipeline_ms.unwrap_or(defaults.slow_pipeline_ms),
        max_result_docs: cfg.max_result_docs.or(defaults.max_result_docs),
    });
    if let Some(seed) = &cfg.data {
        prog_cli::load_data(&db, seed)?;
    }

    let mode: OutputMode = prog_cli::parse_output_mode(cfg.format.as_deref());
    let cmd = to_command(cli.command)?;
    prog_cli::run_with_format(&db, cmd, mode, &mut std::io::stdout().lock())
}
