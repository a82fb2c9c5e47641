use anyhow::{Result, anyhow};
use broker::Event;
use url::Url;

use crate::checker::CheckType;

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Name of the monitor that ran the probe
    pub monitor: String,

    pub check_type: CheckType,

    /// URL or `host:port` that was probed
    pub target: String,

    /// Unix seconds when the probe started
    pub time: i64,

    pub up: bool,

    /// Checker message, or the error when the probe failed
    pub message: String,

    pub latency_ms: u64,
}

impl CheckResult {
    /// Host reported as the Flapjack entity
    pub fn entity(&self) -> Result<String> {
        match self.check_type {
            CheckType::HttpStatus => {
                let url = Url::parse(&self.target)?;
                let host = url.host_str().ok_or_else(|| anyhow!("{} has no host", self.target))?;
                Ok(match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                })
            }
            CheckType::Tcp => self
                .target
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .ok_or_else(|| anyhow!("{} is not host:port", self.target)),
        }
    }

    pub fn state(&self) -> &'static str {
        if self.up { "ok" } else { "critical" }
    }

    /// Convert into the event pushed to Flapjack
    pub fn to_event(&self) -> Result<Event> {
        Ok(Event::service(
            self.entity()?,
            &self.monitor,
            self.state(),
            format!("{} [{}ms]", self.message, self.latency_ms),
            self.time,
        ))
    }
}
