use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Seed file loaded before the command runs.
    pub data: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// error|warn|info|debug|trace|off
    pub log_level: Option<String>,
    pub log_retention: Option<u32>,
    pub slow_pipeline_ms: Option<u64>,
    pub max_result_docs: Option<usize>,
    /// human|plain|json
    pub format: Option<String>,
}

impl AppConfig {
    /// Fills every unset field from `other`.
    fn or(mut self, other: Self) -> Self {
        self.data = self.data.or(other.data);
        self.log_dir = self.log_dir.or(other.log_dir);
        self.log_level = self.log_level.or(other.log_level);
        self.log_retention = self.log_retention.or(other.log_retention);
        self.slow_pipeline_ms = self.slow_pipeline_ms.or(other.slow_pipeline_ms);
        self.max_result_docs = self.max_result_docs.or(other.max_result_docs);
        self.format = self.format.or(other.format);
        self
    }

    fn from_env(env: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data: env("AGGRELITE_DATA").map(PathBuf::from),
            log_dir: env("AGGRELITE_LOG_DIR").map(PathBuf::from),
            log_level: env("AGGRELITE_LOG_LEVEL"),
            log_retention: env("AGGRELITE_LOG_RETENTION").and_then(|s| s.parse().ok()),
            slow_pipeline_ms: env("AGGRELITE_SLOW_PIPELINE_MS").and_then(|s| s.parse().ok()),
            max_result_docs: env("AGGRELITE_MAX_RESULT_DOCS").and_then(|s| s.parse().ok()),
            format: env("AGGRELITE_FORMAT"),
        }
    }

    fn from_file(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                log::warn!("ignoring config {}: {e}", path.display());
                None
            }
        }
    }
}

/// Candidate config files, highest priority first: `--config`, `$AGGRELITE_CONFIG`,
/// the user config directory, then `./aggrelite.toml`.
pub fn config_paths(cli_cfg: Option<&Path>, env: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env("AGGRELITE_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("aggrelite.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("aggrelite.toml"));
    }
    paths
}

/// Resolves settings with precedence env > config files > defaults. Command-line flags
/// are applied on top by the caller. `env` is the variable lookup, normally
/// `|k| std::env::var(k).ok()`.
pub fn load_config(cli_cfg: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> AppConfig {
    let from_files = config_paths(cli_cfg, &env)
        .iter()
        .filter_map(|p| AppConfig::from_file(p))
        .fold(AppConfig::default(), AppConfig::or);
    AppConfig::from_env(&env).or(from_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn cli_file_beats_env_file_and_env_beats_both() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        std::fs::write(&first, "log_level = \"debug\"\n").unwrap();
        std::fs::write(&second, "log_level = \"error\"\nslow_pipeline_ms = 20\n").unwrap();

        let env = vars(&[("AGGRELITE_CONFIG", second.to_str().unwrap())]);
        let cfg = load_config(Some(first.as_path()), env);
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.slow_pipeline_ms, Some(20));

        let env = vars(&[("AGGRELITE_CONFIG", second.to_str().unwrap()), ("AGGRELITE_SLOW_PIPELINE_MS", "5")]);
        assert_eq!(load_config(Some(first.as_path()), env).slow_pipeline_ms, Some(5));
    }

    #[test]
    fn unreadable_or_invalid_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "no_such_key = 1\n").unwrap();
        let cfg = load_config(Some(bad.as_path()), vars(&[("AGGRELITE_FORMAT", "json")]));
        assert_eq!(cfg.format.as_deref(), Some("json"));
        assert!(load_config(Some(dir.path().join("missing.toml").as_path()), vars(&[])).data.is_none());
    }
}
