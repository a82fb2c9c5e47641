use std::io::Error as IoError;

use broker::config::ConfigError;
use broker::{NormalizeError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Couldn't connect to the queue server: {0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Normalizer(#[from] NormalizeError),
}
