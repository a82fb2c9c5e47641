use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use broker::config::{QueueConfig, RedisConfig, parse_duration, validate_address};
use serde::Deserialize;

use crate::checker::CheckType;

/// Timeout applied when a monitor does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Checker daemon configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub monitors: Vec<MonitorConfig>,
}

/// A single probe definition, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// Check name reported to Flapjack
    pub name: String,
    /// URL for HTTP probes, `host:port` for TCP probes
    pub url: String,
    /// How often to probe, e.g. `30s`
    pub freq: String,
    pub timeout: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl MonitorConfig {
    pub fn interval(&self) -> Result<Duration> {
        parse_duration(&self.freq).with_context(|| format!("monitor `{}`: bad freq", self.name))
    }

    pub fn timeout(&self) -> Result<Duration> {
        match &self.timeout {
            Some(raw) => parse_duration(raw)
                .with_context(|| format!("monitor `{}`: bad timeout", self.name)),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }
}

impl CheckerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("couldn't read {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("couldn't parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_address(&self.redis.address)?;

        if self.monitors.is_empty() {
            bail!("no monitors configured");
        }
        for monitor in &self.monitors {
            monitor.interval()?;
            monitor.timeout()?;
        }
        Ok(())
    }
}
