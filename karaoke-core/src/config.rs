use crate::candidates::DEFAULT_QUERY_SUFFIX;
use crate::error::{CoreError, Result};
use crate::offset::DEFAULT_OFFSET_NAMESPACE;
use crate::preferences::DEFAULT_PREFERENCES_KEY;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const LOG_TARGET: &str = "karaoke::config";

/// Environment variable consulted when `video.api_key` is not set
pub const API_KEY_ENV_VAR: &str = "YOUTUBE_DATA_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KaraokeConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Clock sampling period while playing
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Seconds added or removed by one nudge
    #[serde(default = "default_nudge_step")]
    pub nudge_step: f64,
    /// Bound for absolute offsets, in seconds
    #[serde(default = "default_offset_limit")]
    pub offset_limit: f64,
    /// Fraction of the player that must be on screen to count as visible
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,
    #[serde(default = "default_true")]
    pub autoplay: bool,
}

const fn default_poll_interval() -> u64 {
    100
}

const fn default_nudge_step() -> f64 {
    0.1
}

const fn default_offset_limit() -> f64 {
    40.0
}

const fn default_visibility_threshold() -> f64 {
    0.1
}

const fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            nudge_step: default_nudge_step(),
            offset_limit: default_offset_limit(),
            visibility_threshold: default_visibility_threshold(),
            autoplay: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Provider priority: providers are tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<LyricsProviderType>,
}

fn default_providers() -> Vec<LyricsProviderType> {
    vec![LyricsProviderType::Lrclib]
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsProviderType {
    Lrclib,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// YouTube Data API key; falls back to `YOUTUBE_DATA_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_query_suffix")]
    pub query_suffix: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_query_suffix() -> String {
    DEFAULT_QUERY_SUFFIX.to_string()
}

const fn default_max_results() -> u32 {
    10
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            query_suffix: default_query_suffix(),
            max_results: default_max_results(),
        }
    }
}

impl VideoConfig {
    /// Configured API key, or the one from the environment. Blank keys count as unset.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the database location
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_offset_namespace")]
    pub offset_namespace: String,
    #[serde(default = "default_preferences_key")]
    pub preferences_key: String,
}

fn default_offset_namespace() -> String {
    DEFAULT_OFFSET_NAMESPACE.to_string()
}

fn default_preferences_key() -> String {
    DEFAULT_PREFERENCES_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            offset_namespace: default_offset_namespace(),
            preferences_key: default_preferences_key(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::paths::store_db_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to ~/.config/karaoke/karaoke.log
    #[serde(default)]
    pub enabled: bool,
}

impl KaraokeConfig {
    /// Get the config file path (~/.config/karaoke/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create a template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Same as [`load_or_create`](Self::load_or_create) for an explicit path.
    ///
    /// # Errors
    ///
    /// See [`load_or_create`](Self::load_or_create).
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(config_path, CONFIG_TEMPLATE)?;
            info!(target: LOG_TARGET, "Wrote config template to {:?}", config_path);

            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate TOML config text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value is out of range.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(CoreError::ConfigInvalid {
                message: message.to_string(),
            })
        };

        if self.sync.poll_interval_ms == 0 {
            return invalid("sync.poll_interval_ms must be greater than zero");
        }
        if !(self.sync.nudge_step.is_finite() && self.sync.nudge_step > 0.0) {
            return invalid("sync.nudge_step must be a positive number");
        }
        if !(self.sync.offset_limit.is_finite() && self.sync.offset_limit > 0.0) {
            return invalid("sync.offset_limit must be a positive number");
        }
        if !(0.0..=1.0).contains(&self.sync.visibility_threshold) {
            return invalid("sync.visibility_threshold must be between 0 and 1");
        }
        if !(1..=50).contains(&self.video.max_results) {
            return invalid("video.max_results must be between 1 and 50");
        }
        if self.storage.offset_namespace.is_empty() {
            return invalid("storage.offset_namespace must not be empty");
        }
        if self.storage.preferences_key.is_empty() {
            return invalid("storage.preferences_key must not be empty");
        }
        Ok(())
    }
}

pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Karaoke Configuration
# ~/.config/karaoke/config.toml

[sync]
# How often the player clock is sampled while playing
poll_interval_ms = 100
# Seconds per nudge
nudge_step = 0.1
# Absolute offsets are clamped to +/- this many seconds
offset_limit = 40.0
# Fraction of the player that must be visible before it counts as on screen
visibility_threshold = 0.1
autoplay = true

[lyrics]
# Providers are tried in order; first successful result wins
providers = ["lrclib"]

[video]
# YouTube Data API key. Falls back to the "#,
    API_KEY_ENV_VAR,
    r#" environment variable.
# api_key = ""
query_suffix = ""#,
    DEFAULT_QUERY_SUFFIX,
    r#""
max_results = 10

[storage]
# database_path = "/path/to/karaoke.db"
offset_namespace = ""#,
    DEFAULT_OFFSET_NAMESPACE,
    r#""
preferences_key = ""#,
    DEFAULT_PREFERENCES_KEY,
    r#""

[logging]
# Also write logs to ~/.config/karaoke/karaoke.log
enabled = false
"#
);
