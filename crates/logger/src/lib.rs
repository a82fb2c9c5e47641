//! Shared tracing setup for the httpbroker binaries.
//!
//! `RUST_LOG` selects the filter, `RUST_LOG_FORMAT=json` switches to JSON lines.

mod tracing;

pub use crate::tracing::{init as init_tracing, init_with_debug};
