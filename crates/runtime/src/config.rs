//! Runtime settings and the TOML loader for [`SoloConfig`].
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use solo_core::SoloConfig;

/// Worker and channel settings, separate from the gameplay [`SoloConfig`].
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub solo: SoloConfig,
    /// Fallback evaluation cadence when no host event or timer fires.
    pub scan_interval: Duration,
    /// Minimum gap between two logged tick failures.
    pub error_log_cooldown: Duration,
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
    /// Where [`ConfigLoader`] reads the gameplay config from, if anywhere.
    pub config_path: Option<PathBuf>,
}

impl RuntimeConfig {
    pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_ERROR_LOG_COOLDOWN: Duration = Duration::from_secs(30);
    pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(100);

    /// Construct runtime configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SOLO_SCAN_INTERVAL_MS` - Fallback scan cadence (default: 5000, min: 100)
    /// - `SOLO_ERROR_COOLDOWN_SECS` - Tick error log cooldown (default: 30)
    /// - `SOLO_COMMAND_BUFFER` - Command channel capacity (default: 32)
    /// - `SOLO_EVENT_BUFFER` - Event channel capacity per topic (default: 100)
    /// - `SOLO_CONFIG_PATH` - TOML file with the gameplay config
    ///
    /// When `SOLO_CONFIG_PATH` is set the file is loaded right away; use
    /// [`RuntimeConfig::load_solo`] to reload it later.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(millis) = read_env::<u64>("SOLO_SCAN_INTERVAL_MS") {
            config.scan_interval = Duration::from_millis(millis).max(Self::MIN_SCAN_INTERVAL);
        }
        if let Some(secs) = read_env::<u64>("SOLO_ERROR_COOLDOWN_SECS") {
            config.error_log_cooldown = Duration::from_secs(secs);
        }
        if let Some(size) = read_env::<usize>("SOLO_COMMAND_BUFFER") {
            config.command_buffer_size = size.max(1);
        }
        if let Some(size) = read_env::<usize>("SOLO_EVENT_BUFFER") {
            config.event_buffer_size = size.max(1);
        }
        if let Some(path) = read_env::<PathBuf>("SOLO_CONFIG_PATH") {
            config.config_path = Some(path);
            config.solo = config.load_solo()?;
        }

        Ok(config)
    }

    pub fn with_solo(mut self, solo: SoloConfig) -> Self {
        self.solo = solo;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Re-reads the gameplay config from `config_path`, or returns the
    /// current one when no path is configured.
    pub fn load_solo(&self) -> anyhow::Result<SoloConfig> {
        match &self.config_path {
            Some(path) => ConfigLoader::load(path),
            None => Ok(self.solo.clone()),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            solo: SoloConfig::default(),
            scan_interval: Self::DEFAULT_SCAN_INTERVAL,
            error_log_cooldown: Self::DEFAULT_ERROR_LOG_COOLDOWN,
            command_buffer_size: 32,
            event_buffer_size: 100,
            config_path: None,
        }
    }
}

/// Loader for the gameplay config from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file.
    ///
    /// Missing keys fall back to [`SoloConfig::default`].
    pub fn load(path: &Path) -> anyhow::Result<SoloConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<SoloConfig> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
