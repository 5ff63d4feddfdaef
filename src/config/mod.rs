//! Capture configuration
//!
//! Every selector list, timing constant and backend setting the harvester uses
//! lives here, loaded from an optional `config.yaml` and defaulted otherwise.

mod merger;
mod selectors;

pub use merger::{merge_overrides, ConfigOverrides};
pub use selectors::SelectorConfig;

use crate::utils::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration from config.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Convergence loop and discovery timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay after each scroll reset before re-reading the UI
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Consecutive unchanged iterations that mean end of history
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: u32,

    /// Hard cap on total scrolling time
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// How long to keep looking for the message container
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    #[serde(default = "default_discovery_poll_ms")]
    pub discovery_poll_ms: u64,

    /// Numeric timestamps at or below this are counters, not epoch milliseconds
    #[serde(default = "default_epoch_threshold_ms")]
    pub epoch_threshold_ms: i64,
}

fn default_settle_delay_ms() -> u64 {
    1200
}

fn default_stability_threshold() -> u32 {
    3
}

fn default_max_duration_ms() -> u64 {
    2 * 60 * 1000
}

fn default_discovery_timeout_ms() -> u64 {
    8000
}

fn default_discovery_poll_ms() -> u64 {
    200
}

fn default_epoch_threshold_ms() -> i64 {
    1_000_000_000
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn discovery_poll(&self) -> Duration {
        Duration::from_millis(self.discovery_poll_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            stability_threshold: default_stability_threshold(),
            max_duration_ms: default_max_duration_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            discovery_poll_ms: default_discovery_poll_ms(),
            epoch_threshold_ms: default_epoch_threshold_ms(),
        }
    }
}

/// Backend lookup API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Run the enrichment phase at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Server origin, e.g. `https://chat.example.com`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default = "default_messages_path")]
    pub messages_path: String,

    #[serde(default = "default_identities_path")]
    pub identities_path: String,

    #[serde(default = "default_message_batch_size")]
    pub message_batch_size: usize,

    #[serde(default = "default_identity_batch_size")]
    pub identity_batch_size: usize,

    /// Bearer token for the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Raw Cookie header carrying the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_messages_path() -> String {
    "/messages/by-id".to_string()
}

fn default_identities_path() -> String {
    "/identities/by-name".to_string()
}

fn default_message_batch_size() -> usize {
    100
}

fn default_identity_batch_size() -> usize {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            origin: None,
            messages_path: default_messages_path(),
            identities_path: default_identities_path(),
            message_batch_size: default_message_batch_size(),
            identity_batch_size: default_identity_batch_size(),
            auth_token: None,
            cookie: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Snapshot output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory snapshots are written to
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Source name used when the page offers none
    #[serde(default = "default_source_name")]
    pub fallback_source_name: String,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_filename_prefix() -> String {
    "chat-history".to_string()
}

fn default_source_name() -> String {
    "conversation".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            filename_prefix: default_filename_prefix(),
            fallback_source_name: default_source_name(),
        }
    }
}

/// Configuration file manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for an explicit config file
    pub fn new(config_path: &Path) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
        }
    }

    /// Manager for `<user config dir>/chat-harvest/config.yaml`
    pub fn user_default() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(&dir.join("chat-harvest").join("config.yaml")))
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Read config from file, returning defaults if not found
    pub fn read(&self) -> Result<HarvestConfig, String> {
        if !self.config_path.exists() {
            log::debug!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(HarvestConfig::default());
        }

        let content =
            std::fs::read_to_string(&self.config_path).with_context("Failed to read config file")?;

        serde_yaml::from_str(&content).with_context("Failed to parse config file")
    }

    /// Write config to file
    pub fn write(&self, config: &HarvestConfig) -> Result<(), String> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context("Failed to create config directory")?;
        }

        let content = serde_yaml::to_string(config).with_context("Failed to serialize config")?;

        std::fs::write(&self.config_path, content).with_context("Failed to write config file")
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
