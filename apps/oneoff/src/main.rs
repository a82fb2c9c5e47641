#![warn(clippy::all, clippy::pedantic)]

use std::time::Duration;

use broker::config::{QueueConfig, RedisConfig, parse_duration, validate_address};
use broker::{DEFAULT_PROTOCOL_VERSION, DEFAULT_QUEUE, Event, Transport, unix_now};
use clap::Parser;
use tracing::{debug, info};

mod error;

use error::AppError;

/// Submits a single event to Flapjack
#[derive(Debug, Parser)]
#[command(name = "oneoff", version, about)]
struct Cli {
    /// Entity name
    entity: String,
    /// Check name
    check: String,
    /// Current state
    state: String,
    /// Summary of the event
    summary: String,

    /// Redis server to connect to (host:port)
    #[arg(short, long, default_value = "localhost:6380")]
    server: String,

    /// Redis database to connect to
    #[arg(short, long, default_value_t = 0)]
    database: i64,

    /// Queue to push the event onto
    #[arg(short, long, default_value = DEFAULT_QUEUE)]
    queue: String,

    /// Flapjack consumer protocol version
    #[arg(long, default_value_t = DEFAULT_PROTOCOL_VERSION)]
    protocol_version: u8,

    /// Keep resubmitting the event this often (e.g. 10s, 500ms)
    #[arg(short, long, value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Enable verbose output
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn event(&self) -> Event {
        Event::service(&self.entity, &self.check, &self.state, &self.summary, unix_now())
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    logger::init_with_debug(cli.debug);
    debug!(?cli, "Parsed arguments");

    validate_address(&cli.server)?;

    let redis = RedisConfig { address: cli.server.clone(), database: cli.database };
    let queue = QueueConfig { name: cli.queue.clone(), protocol_version: cli.protocol_version };
    let transport = Transport::connect(&redis, &queue).await.map_err(AppError::Connect)?;

    submit(&transport, &cli.event()).await?;

    let Some(interval) = cli.interval else {
        return Ok(());
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
            () = tokio::time::sleep(interval) => {}
        }

        submit(&transport, &cli.event()).await?;
    }
}

async fn submit(transport: &Transport, event: &Event) -> Result<(), AppError> {
    if let Ok(data) = serde_json::to_string(event) {
        debug!("Event data: {data}");
    }

    let length = transport.send(event).await.map_err(AppError::Send)?;
    info!(key = %event.key(), queue = transport.queue_name(), length, "Submitted event");
    Ok(())
}
