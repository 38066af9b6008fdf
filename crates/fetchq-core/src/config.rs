use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Retry backoff parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            max_delay_ms: 30_000,
        }
    }
}

/// Engine configuration loaded from `~/.config/fetchq/config.toml`.
///
/// Every field has a default, so a config file only needs the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of tasks transferring at the same time.
    pub concurrency_limit: usize,
    /// Attempts per task, including the first.
    pub max_attempts_per_task: u32,
    /// Wall-clock limit for one attempt (probe excluded).
    pub per_attempt_timeout_ms: u64,
    /// Limit for establishing the connection of one request.
    pub connect_timeout_ms: u64,
    /// Wall-clock limit for the metadata probe.
    pub probe_timeout_ms: u64,
    /// Advisory receive buffer size handed to libcurl.
    pub chunk_size_hint_bytes: usize,
    /// Continue partial files with `Range: bytes=N-` when the remote supports it.
    pub resume_enabled: bool,
    /// Minimum spacing between progress samples of one task.
    pub progress_interval_ms: u64,
    /// Shared base directory; relative destinations are resolved under it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            max_attempts_per_task: 3,
            per_attempt_timeout_ms: 30 * 60 * 1000,
            connect_timeout_ms: 30_000,
            probe_timeout_ms: 30_000,
            chunk_size_hint_bytes: 64 * 1024,
            resume_enabled: true,
            progress_interval_ms: 100,
            base_dir: None,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrency_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrency_limit must be at least 1".into(),
            ));
        }
        if self.max_attempts_per_task == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts_per_task must be at least 1".into(),
            ));
        }
        if self.per_attempt_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "per_attempt_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
