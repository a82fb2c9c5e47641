use std::{env, fmt, fs, io, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_PROTOCOL_VERSION, DEFAULT_QUEUE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Couldn't write config file: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("Couldn't parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Couldn't serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("Invalid address `{0}`, should be in format `host:port` (e.g. 127.0.0.1:6380)")]
    InvalidAddress(String),
    #[error("Invalid duration `{0}`, expected e.g. `10s`, `500ms`, `5m` or `1h`")]
    InvalidDuration(String),
}

/// Complete broker configuration, handed to each component at construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub http: HttpConfig,
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub reconciler: ReconcilerConfig,
    pub intake: IntakeConfig,
}

/// Ingestion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Route serving `POST` (ingest) and `GET` (dump)
    pub path: String,
    /// Timeout for SNS subscription confirmation fetches
    pub confirm_timeout_seconds: u64,
}

/// Redis server holding the Flapjack queues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port`
    pub address: String,
    pub database: i64,
}

/// Queue naming and consumer generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub interval_seconds: u64,
    /// Log every event sent
    pub debug: bool,
}

/// Buffering between request handlers and the store owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub buffer: usize,
    pub submit_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3090,
            path: "/state".into(),
            confirm_timeout_seconds: 10,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { address: "localhost:6380".into(), database: 0 }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { name: DEFAULT_QUEUE.into(), protocol_version: DEFAULT_PROTOCOL_VERSION }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { interval_seconds: 10, debug: false }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { buffer: 1024, submit_timeout_ms: 500 }
    }
}

impl HttpConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_seconds)
    }
}

impl RedisConfig {
    /// Connection URL selecting the configured database
    pub fn url(&self) -> String {
        format!("redis://{}/{}", self.address, self.database)
    }
}

impl ReconcilerConfig {
    /// Tick interval, never shorter than one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl IntakeConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Check that `address` has the `host:port` form expected by the queue server
pub fn validate_address(address: &str) -> Result<(), ConfigError> {
    match address.split_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ConfigError::InvalidAddress(address.to_string())),
    }
}

/// Parse a duration such as `10s`, `500ms`, `5m` or `1h`.
///
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (value, unit) = raw.split_at(split);
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let value: u64 = value.parse().map_err(|_| invalid())?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(invalid()),
    };

    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/httpbroker/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("httpbroker/config.toml"))
}

impl fmt::Display for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Broker Configuration:")?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;
        write_1(f, "Path", &self.http.path)?;
        write_title_1(f, "Redis")?;
        write_1(f, "Address", &self.redis.address)?;
        write_1(f, "Database", &self.redis.database)?;
        write_title_1(f, "Queue")?;
        write_1(f, "Name", &self.queue.name)?;
        write_1(f, "Protocol Version", &self.queue.protocol_version)?;
        write_title_1(f, "Reconciler")?;
        write_1(f, "Interval (s)", &self.reconciler.interval_seconds)?;
        write_1(f, "Debug", &self.reconciler.debug)?;
        write_title_1(f, "Intake")?;
        write_1(f, "Buffer", &self.intake.buffer)?;
        write_1(f, "Submit Timeout (ms)", &self.intake.submit_timeout_ms)?;

        Ok(())
    }
}

impl BrokerConfig {
    /// Generate BrokerConfig structure from file
    ///
    /// Creates a default config in ~/.config/httpbroker/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// let cfg = broker::BrokerConfig::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), broker::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.http.port, 3090);
        assert_eq!(config.http.path, "/state");
        assert_eq!(config.redis.url(), "redis://localhost:6380/0");
        assert_eq!(config.queue.name, "events");
        assert_eq!(config.queue.protocol_version, 2);
        assert_eq!(config.reconciler.interval(), Duration::from_secs(10));
        assert_eq!(config.intake.submit_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broker");

        let config = BrokerConfig::from_config(Some(&path)).unwrap();
        assert_eq!(config, BrokerConfig::default());
        assert!(dir.path().join("broker.toml").exists());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[redis]\naddress = \"redis.internal:6379\"\ndatabase = 3\n\n[queue]\nprotocol_version = 1\n",
        )
        .unwrap();

        let config = BrokerConfig::from_config(Some(&path)).unwrap();
        assert_eq!(config.redis.url(), "redis://redis.internal:6379/3");
        assert_eq!(config.queue.protocol_version, 1);
        assert_eq!(config.queue.name, "events");
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_bad_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[redis\n").unwrap();

        assert!(matches!(
            BrokerConfig::from_config(Some(&path)),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_interval_has_a_floor() {
        let config = ReconcilerConfig { interval_seconds: 0, debug: false };
        assert_eq!(config.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_address_validation() {
        assert!(validate_address("localhost:6380").is_ok());
        assert!(validate_address("10.0.0.4:6379").is_ok());
        assert!(matches!(
            validate_address("localhost"),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(validate_address(":6380").is_err());
        assert!(validate_address("localhost:redis").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("ten").is_err());
        assert!(parse_duration("10d").is_err());
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = BrokerConfig::default().to_string();
        assert!(rendered.contains("Redis"));
        assert!(rendered.contains("Address: localhost:6380"));
    }
}
