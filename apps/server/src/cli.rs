use std::path::PathBuf;
use std::time::Duration;

use broker::BrokerConfig;
use broker::config::{ConfigError, parse_duration, validate_address};
use clap::Parser;

/// Caches monitoring states received over HTTP and replays them into Flapjack
#[derive(Debug, Parser)]
#[command(name = "httpbroker", version, about)]
pub struct Cli {
    /// TOML configuration file, written with defaults when missing
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind the HTTP listener to
    #[arg(long)]
    pub bind: Option<String>,

    /// Route accepting states (POST) and dumping the cache (GET)
    #[arg(long)]
    pub path: Option<String>,

    /// Redis server holding the Flapjack queues (host:port)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Redis database number
    #[arg(short, long)]
    pub database: Option<i64>,

    /// Time between reconciliation ticks (e.g. 10s)
    #[arg(short, long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Queue events are pushed onto
    #[arg(short, long)]
    pub queue: Option<String>,

    /// Flapjack consumer protocol version
    #[arg(long)]
    pub protocol_version: Option<u8>,

    /// Log every event sent to the queue
    #[arg(long)]
    pub debug: bool,

    /// Keep events in memory instead of connecting to Redis
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Effective configuration: the file given with `--config` (or defaults)
    /// overridden by any flag present on the command line
    pub fn load_config(&self) -> Result<BrokerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => BrokerConfig::from_config(Some(path))?,
            None => BrokerConfig::default(),
        };

        self.apply(&mut config);
        validate_address(&config.redis.address)?;
        Ok(config)
    }

    fn apply(&self, config: &mut BrokerConfig) {
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(bind) = &self.bind {
            config.http.bind = bind.clone();
        }
        if let Some(path) = &self.path {
            config.http.path = path.clone();
        }
        if let Some(server) = &self.server {
            config.redis.address = server.clone();
        }
        if let Some(database) = self.database {
            config.redis.database = database;
        }
        if let Some(interval) = self.interval {
            config.reconciler.interval_seconds = interval.as_secs();
        }
        if let Some(queue) = &self.queue {
            config.queue.name = queue.clone();
        }
        if let Some(version) = self.protocol_version {
            config.queue.protocol_version = version;
        }
        config.reconciler.debug |= self.debug;
    }
}
