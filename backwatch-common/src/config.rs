// Configuration for Backwatch: which servers to check and where to report

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::codec::{FileNameCodec, StripMode, TimeFormatSetting};
use crate::error::ValidationError;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/backwatch/backwatch.json";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "BACKWATCH_CONFIG";

/// One server whose backups are checked
///
/// Backup files are named `<date_time_prefix><timestamp><file_extension>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupTargetConfig {
    /// Server name shown in reports
    pub server_name: String,

    /// Directory the backups land in first
    pub base_dir: PathBuf,

    /// Replica directory expected to mirror `base_dir`
    pub secondary_base_dir: PathBuf,

    /// Whether this backup is taken daily (informational)
    #[serde(default)]
    pub daily: bool,

    /// Suffix of the backup file, including the dot
    #[serde(default)]
    pub file_extension: String,

    /// Everything before the timestamp
    #[serde(default)]
    pub date_time_prefix: String,

    /// How the timestamp is written in the file name
    #[serde(default)]
    pub time_format: TimeFormatSetting,

    /// How prefix and extension are stripped before parsing
    #[serde(default)]
    pub strip_mode: StripMode,

    /// Freshness window for this server only (hours)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness_hours: Option<u32>,
}

impl BackupTargetConfig {
    /// Codec for this server's naming convention
    ///
    /// Fails when `time_format` names a layout the codec cannot decode.
    pub fn codec(&self) -> Result<FileNameCodec, ValidationError> {
        let format = self
            .time_format
            .resolve()
            .map_err(|value| ValidationError::UnknownTimeFormat { value })?;

        Ok(FileNameCodec::new(
            self.date_time_prefix.as_str(),
            self.file_extension.as_str(),
            format,
        )
        .with_mode(self.strip_mode))
    }

    pub fn freshness_override(&self) -> Option<Duration> {
        self.freshness_hours.map(|h| Duration::hours(i64::from(h)))
    }
}

/// A single problem found in a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigIssue {}

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackwatchConfig {
    /// Servers to check, in report order
    #[serde(rename = "server_backup_confs", default)]
    pub targets: Vec<BackupTargetConfig>,

    /// Discord-style webhook that receives the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_webhook_url: Option<String>,

    /// Freshness window in hours (default: 24)
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u32,

    /// Username the report is posted as
    #[serde(default = "default_username")]
    pub username: String,

    /// Server blocks per webhook message (default: 2)
    #[serde(default = "default_servers_per_message")]
    pub servers_per_message: usize,
}

fn default_freshness_hours() -> u32 {
    24
}

fn default_username() -> String {
    "backwatch".to_string()
}

fn default_servers_per_message() -> usize {
    2
}

impl Default for BackwatchConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            discord_webhook_url: None,
            freshness_hours: default_freshness_hours(),
            username: default_username(),
            servers_per_message: default_servers_per_message(),
        }
    }
}

impl BackwatchConfig {
    /// Config path, honouring `BACKWATCH_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from file
    ///
    /// `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config: Self = if is_toml {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
        };

        Ok(config)
    }

    /// Global freshness window
    pub fn freshness(&self) -> Duration {
        Duration::hours(i64::from(self.freshness_hours))
    }

    /// Look up a server by name
    pub fn target(&self, server_name: &str) -> Option<&BackupTargetConfig> {
        self.targets.iter().find(|t| t.server_name == server_name)
    }

    /// Check the configuration for problems, collecting all of them
    pub fn validate(&self) -> Result<(), Vec<ConfigIssue>> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        if self.freshness_hours == 0 {
            issues.push(ConfigIssue::new(
                "freshness_hours",
                "Freshness window must be at least one hour",
            ));
        }

        if self.servers_per_message == 0 {
            issues.push(ConfigIssue::new(
                "servers_per_message",
                "At least one server must fit in a message",
            ));
        }

        for (idx, target) in self.targets.iter().enumerate() {
            let field = |name: &str| format!("server_backup_confs[{idx}].{name}");

            if target.server_name.trim().is_empty() {
                issues.push(ConfigIssue::new(field("server_name"), "Server name cannot be empty"));
            } else if !seen.insert(target.server_name.as_str()) {
                issues.push(ConfigIssue::new(
                    field("server_name"),
                    format!("Duplicate server name '{}'", target.server_name),
                ));
            }

            if target.base_dir.as_os_str().is_empty() {
                issues.push(ConfigIssue::new(
                    field("base_dir"),
                    "Primary directory cannot be empty",
                ));
            }

            if target.secondary_base_dir.as_os_str().is_empty() {
                issues.push(ConfigIssue::new(
                    field("secondary_base_dir"),
                    "Secondary directory cannot be empty",
                ));
            }

            if target.freshness_hours == Some(0) {
                issues.push(ConfigIssue::new(
                    field("freshness_hours"),
                    "Freshness window must be at least one hour",
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}
