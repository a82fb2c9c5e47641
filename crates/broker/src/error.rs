//! Error types for the broker

use std::time::Duration;

use thiserror::Error;

/// Errors raised while turning an inbound payload into a cached state
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The request body could not be read
    #[error("Couldn't read request body: {0}")]
    Body(String),

    /// The request body is not a JSON object
    #[error("Couldn't read request body: {0}")]
    Json(#[from] serde_json::Error),

    /// The notification envelope carried a message that is not an alarm
    #[error("Couldn't read alarm from the notification message: {0}")]
    AlarmMessage(serde_json::Error),

    /// The subscription confirmation fetch failed
    #[error("Couldn't confirm subscription: {0}")]
    Confirmation(#[from] reqwest::Error),

    /// The HTTP client used for confirmations could not be built
    #[error("Couldn't build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors raised when talking to the state store owner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The intake channel stayed full for the whole submit timeout
    #[error("State store intake is saturated (waited {0:?})")]
    Saturated(Duration),

    /// The owner task has stopped
    #[error("State store is not running")]
    Closed,
}

/// A required event field is empty
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No entity")]
    NoEntity,

    #[error("No check")]
    NoCheck,

    #[error("No state")]
    NoState,

    #[error("No summary")]
    NoSummary,
}

/// Errors raised while pushing an event onto the queue
#[derive(Error, Debug)]
pub enum TransportError {
    /// The event failed validation, nothing was written
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// The event could not be encoded
    #[error("Couldn't encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Redis connection or command failure
    #[error("Queue connection error: {0}")]
    Connection(#[from] redis::RedisError),

    /// Any other queue backend failure
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}
