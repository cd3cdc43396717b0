mod command;
mod config;
mod runner;
mod util;

pub use command::Command;
pub use config::{AppConfig, config_paths, load_config};
pub use runner::{OutputMode, run, run_with_format};
pub use util::{load_data, parse_output_mode};
