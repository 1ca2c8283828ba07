use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::notification::NotificationLevel;
use crate::status::Status;

const CANDIDATES: [&str; 4] = [
    "cistatus.toml",
    "cistatus.json",
    "cistatus.yaml",
    "cistatus.yml",
];

/// Configuration file structure for cistatus.
///
/// Configuration files are loaded from the current directory, the user's
/// config directory, or a path given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Engine behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,

    /// Notification defaults
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Capacity of the status-change broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Status a pipeline reports before its first reconcile
    #[serde(default)]
    pub default_status: Status,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationConfig {
    /// Level given to notification settings created on demand
    #[serde(default = "default_notification_level")]
    pub default_level: NotificationLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            default_status: Status::Pending,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_level: default_notification_level(),
        }
    }
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_notification_level() -> NotificationLevel {
    NotificationLevel::Global
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cistatus.toml, ./cistatus.json, ./cistatus.yaml, ./cistatus.yml
    /// 3. `<config dir>/cistatus/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        if let Some(path) = find_in_dir(Path::new(".")) {
            return Self::load_from_path(&path);
        }

        if let Some(path) = user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        // No config file found, return defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .ok()
                    .or_else(|| serde_json::from_str(&contents).ok())
                    .or_else(|| serde_yaml::from_str(&contents).ok())
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.event_capacity == 0 {
            anyhow::bail!("engine.event-capacity must be greater than zero");
        }
        Ok(())
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.exists())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cistatus").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.event_capacity, 256);
        assert_eq!(config.engine.default_status, Status::Pending);
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert_eq!(
            config.notifications.default_level,
            NotificationLevel::Global
        );
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[engine]
event-capacity = 32
default-status = "running"

[output]
format = "json"
pretty = true

[notifications]
default-level = "watch"
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.engine.event_capacity, 32);
        assert_eq!(config.engine.default_status, Status::Running);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
        assert_eq!(config.notifications.default_level, NotificationLevel::Watch);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "engine": {
    "event-capacity": 8
  },
  "output": {
    "format": "json"
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.engine.event_capacity, 8);
        assert_eq!(config.engine.default_status, Status::Pending);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_yaml_without_extension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "output:\n  pretty: true\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert!(config.output.pretty);
    }

    #[test]
    fn test_rejects_zero_event_capacity() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[engine]\nevent-capacity = 0\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_status() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[engine]\ndefault-status = \"created\"\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("does-not-exist/cistatus.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_find_in_dir_prefers_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("cistatus.yaml"), "{}").unwrap();
        std::fs::write(temp_dir.path().join("cistatus.toml"), "").unwrap();

        let found = find_in_dir(temp_dir.path()).unwrap();
        assert!(found.ends_with("cistatus.toml"));
    }

    #[test]
    fn test_find_in_dir_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(find_in_dir(temp_dir.path()).is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("saved.toml");

        let mut config = Config::default();
        config.engine.event_capacity = 99;
        config.output.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.engine.event_capacity, 99);
        assert_eq!(reloaded.output.format, OutputFormat::Json);
    }
}
