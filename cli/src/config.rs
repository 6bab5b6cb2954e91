use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stepgauge_core::diagnostics::{DEFAULT_LOG_FILTER, DEFAULT_TRACE_FILE_PREFIX};

pub const CONFIG_FILE_NAME: &str = "stepgauge.config.toml";
pub const CONFIG_PATH_ENV: &str = "STEPGAUGE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub paths: PathsConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Difficulty label searched for when no level is given.
    pub target_difficulty: String,
    pub level_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub logs_dir: PathBuf,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_difficulty: "Beginner".to_string(),
            level_index: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            report_dir: PathBuf::from("data/reports"),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: DEFAULT_LOG_FILTER.to_string(),
            trace_file_prefix: DEFAULT_TRACE_FILE_PREFIX.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `explicit` when given, otherwise the first config file found by
    /// [`discover_config_path`]. No file at all means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_path()?,
        };
        let Some(config_path) = config_path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        Self::from_toml_str(&content).with_context(|| {
            format!("failed to parse config TOML from {}", config_path.display())
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("invalid config TOML")?;
        Ok(config)
    }
}

pub fn discover_config_path() -> Result<Option<PathBuf>> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    Ok(candidates.into_iter().find(|path| path.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = AppConfig::from_toml_str("[analysis]\nlevel_index = 2\n")
            .expect("partial config should parse");
        assert_eq!(config.analysis.level_index, Some(2));
        assert_eq!(config.analysis.target_difficulty, "Beginner");
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn explicit_path_is_read() {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("custom.toml");
        fs::write(
            &path,
            "[analysis]\ntarget_difficulty = \"Easy\"\n[paths]\nreport_dir = \"out\"\n",
        )
        .expect("writing config should work");

        let config = AppConfig::load(Some(&path)).expect("explicit config should load");
        assert_eq!(config.analysis.target_difficulty, "Easy");
        assert_eq!(config.paths.report_dir, PathBuf::from("out"));
        assert_eq!(config.paths.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        assert!(AppConfig::load(Some(&temp.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(AppConfig::from_toml_str("[analysis\nlevel_index = ").is_err());
    }
}
