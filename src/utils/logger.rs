use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::errors::DbError;

const ENCODER_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from the default file `log4rs.yaml` in the working directory.
/// Prefer `configure_logging` for programmatic control.
///
/// # Errors
/// Returns an error if the file is missing, malformed, or a logger is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes the logging system from a specific config file path.
///
/// # Errors
/// Returns an error if the file is missing, malformed, or a logger is already installed.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Parses `error|warn|info|debug|trace`; anything else means `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let pattern = format!("{}", base.join(format!("{stem}.{{}}.log")).display());
    let roller = FixedWindowRoller::builder()
        .build(&pattern, keep)
        .map_err(|e| DbError::Config(format!("log roller {stem}: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODER_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(DbError::from)
}

/// Builds the rolling-file configuration without installing it:
/// - `app.log`: everything at `level`
/// - `metrics.log`: slow-pipeline warnings (target `aggrelite::metrics`)
/// - `dev6.log`: developer traces, only when `enable_dev6`
///
/// # Errors
/// `Io` when the directory or a log file cannot be created, `Config` for an invalid setup.
pub fn build_config(
    dir: &Path,
    level: LevelFilter,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<Config, DbError> {
    std::fs::create_dir_all(dir)?;
    let keep = retention.unwrap_or(7);
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(dir, "metrics", keep)?)))
        .logger(
            Logger::builder()
                .appender("metrics")
                .additive(false)
                .build("aggrelite::metrics", level),
        );
    let dev6_target = super::devlog::DEV6_TARGET;
    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(dir, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(dev6_target, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(dev6_target, LevelFilter::Off))
    };
    builder
        .build(Root::builder().appender("app").build(level))
        .map_err(|e| DbError::Config(e.to_string()))
}

/// Configure logging globally for the process.
/// - dir: base directory for logs; if None, current directory.
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Fails when the files cannot be created or a logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<(), DbError> {
    let base = dir.map_or_else(
        || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        PathBuf::from,
    );
    let dev6 = std::env::var("AGGRELITE_DEV6")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    let config = build_config(&base, parse_level(level), retention, dev6)?;
    log4rs::init_config(config).map_err(|e| DbError::Config(e.to_string()))?;
    Ok(())
}
