//! Configuration for the upload tracker

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Placeholder substituted with the document identifier in status paths
pub const DOCUMENT_ID_PLACEHOLDER: &str = "{document_id}";

/// Upper bound for every configured delay, period and timeout (one day)
pub const MAX_DURATION_MS: u64 = 86_400_000;

/// Main tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Status polling configuration
    #[serde(default)]
    pub polling: PollingConfig,
    /// Auto-dismiss delays
    #[serde(default)]
    pub dismissal: DismissalConfig,
    /// Transport progress handling
    #[serde(default)]
    pub upload: UploadConfig,
    /// Elapsed clock configuration
    #[serde(default)]
    pub clock: ClockConfig,
    /// Pipeline backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Lifecycle event channel configuration
    #[serde(default)]
    pub events: EventsConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl TrackerConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(Error::config("polling.interval_ms must be greater than zero"));
        }
        if self.polling.max_consecutive_failures == 0 {
            return Err(Error::config(
                "polling.max_consecutive_failures must be greater than zero",
            ));
        }
        if self.clock.tick_ms == 0 {
            return Err(Error::config("clock.tick_ms must be greater than zero"));
        }
        if self.upload.processing_threshold > 100 {
            return Err(Error::config(format!(
                "upload.processing_threshold must be at most 100 (got {})",
                self.upload.processing_threshold
            )));
        }
        if !self.backend.status_path.contains(DOCUMENT_ID_PLACEHOLDER) {
            return Err(Error::config(format!(
                "backend.status_path must contain {}",
                DOCUMENT_ID_PLACEHOLDER
            )));
        }
        if self.events.channel_capacity == 0 {
            return Err(Error::config("events.channel_capacity must be greater than zero"));
        }

        let durations = [
            ("polling.interval_ms", self.polling.interval_ms),
            ("clock.tick_ms", self.clock.tick_ms),
            ("dismissal.success_ms", self.dismissal.success_ms),
            ("dismissal.failure_ms", self.dismissal.failure_ms),
            ("dismissal.background_ms", self.dismissal.background_ms),
            ("dismissal.unconfirmed_ms", self.dismissal.unconfirmed_ms),
            (
                "backend.timeout_secs",
                self.backend.timeout_secs.saturating_mul(1000),
            ),
        ];
        for (name, ms) in durations {
            if ms > MAX_DURATION_MS {
                return Err(Error::config(format!(
                    "{} exceeds the {}ms limit",
                    name, MAX_DURATION_MS
                )));
            }
        }
        Ok(())
    }
}

/// Status polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed period of the shared poll tick in milliseconds (default: 1000)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Consecutive fetch failures before a document is degraded (default: 5)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_max_consecutive_failures() -> u32 { 5 }

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Auto-dismiss delays (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalConfig {
    /// After confirmed pipeline success (default: 5000)
    #[serde(default = "default_success_ms")]
    pub success_ms: u64,
    /// After transport or pipeline failure (default: 8000)
    #[serde(default = "default_failure_ms")]
    pub failure_ms: u64,
    /// After polling gave up and the document was left to the background (default: 4000)
    #[serde(default = "default_background_ms")]
    pub background_ms: u64,
    /// After transport completed without a document identifier (default: 3500)
    #[serde(default = "default_unconfirmed_ms")]
    pub unconfirmed_ms: u64,
}

fn default_success_ms() -> u64 { 5000 }
fn default_failure_ms() -> u64 { 8000 }
fn default_background_ms() -> u64 { 4000 }
fn default_unconfirmed_ms() -> u64 { 3500 }

impl Default for DismissalConfig {
    fn default() -> Self {
        Self {
            success_ms: default_success_ms(),
            failure_ms: default_failure_ms(),
            background_ms: default_background_ms(),
            unconfirmed_ms: default_unconfirmed_ms(),
        }
    }
}

impl DismissalConfig {
    pub fn success(&self) -> Duration {
        Duration::from_millis(self.success_ms)
    }

    pub fn failure(&self) -> Duration {
        Duration::from_millis(self.failure_ms)
    }

    pub fn background(&self) -> Duration {
        Duration::from_millis(self.background_ms)
    }

    pub fn unconfirmed(&self) -> Duration {
        Duration::from_millis(self.unconfirmed_ms)
    }
}

/// Transport progress handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Percent at which transport is treated as done and the item flips to processing (default: 90)
    #[serde(default = "default_processing_threshold")]
    pub processing_threshold: u8,
}

fn default_processing_threshold() -> u8 { 90 }

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            processing_threshold: default_processing_threshold(),
        }
    }
}

/// Elapsed clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Tick period in milliseconds (default: 1000)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 { 1000 }

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl ClockConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Pipeline backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the pipeline service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Status path template, must contain `{document_id}`
    #[serde(default = "default_status_path")]
    pub status_path: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_status_path() -> String {
    "/api/documents/{document_id}/pipeline-status".to_string()
}

fn default_timeout_secs() -> u64 { 10 }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_path: default_status_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Full status URL for a document
    pub fn status_url(&self, document_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.status_path.replace(DOCUMENT_ID_PLACEHOLDER, document_id)
        )
    }
}

/// Lifecycle event channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity (default: 256)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize { 256 }

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 { 8090 }
fn default_enable_cors() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_enable_cors(),
        }
    }
}
