use broker::TransportError;
use broker::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Couldn't connect to Redis: {0}")]
    Connect(#[source] TransportError),
    #[error("Couldn't send event: {0}")]
    Send(#[source] TransportError),
}
