use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::timeout;

/// Type of probe a monitor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CheckType {
    /// `HEAD` request, up only on `200 OK`
    #[serde(rename = "http-status")]
    HttpStatus,
    /// Plain TCP connect
    #[serde(rename = "tcp")]
    Tcp,
}

/// Checker trait for the supported probe types
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe `target`, returning the message reported when it is up
    async fn check(&self, target: &str) -> Result<String>;
}

/// Build the checker for `check_type`
pub fn checker_for(check_type: CheckType, timeout: Duration) -> Result<Box<dyn Checker>> {
    Ok(match check_type {
        CheckType::HttpStatus => Box::new(HttpChecker::new(timeout)?),
        CheckType::Tcp => Box::new(TcpChecker::new(timeout)),
    })
}

/// HTTP status checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).timeout(timeout).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> Result<String> {
        let response = self.client.head(target).send().await?;

        match response.status() {
            StatusCode::OK => Ok("Http status code is 200".to_string()),
            status => Err(anyhow!("Http status is {status}")),
        }
    }
}

/// TCP port checker
pub struct TcpChecker {
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, target: &str) -> Result<String> {
        let connect = tokio::net::TcpStream::connect(target);

        timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| anyhow!("TCP connection timeout"))?
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        Ok("TCP port is open".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_http_200_is_up() {
        let url = serve_once("200 OK").await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        assert_eq!(checker.check(&url).await.unwrap(), "Http status code is 200");
    }

    #[tokio::test]
    async fn test_http_error_status_is_down() {
        let url = serve_once("503 Service Unavailable").await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let err = checker.check(&url).await.unwrap_err();
        assert_eq!(err.to_string(), "Http status is 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_tcp_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap().to_string();
        let checker = TcpChecker::new(Duration::from_secs(2));

        assert!(checker.check(&target).await.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap().to_string();
        drop(listener);

        let checker = TcpChecker::new(Duration::from_secs(2));
        let err = checker.check(&target).await.unwrap_err();
        assert!(err.to_string().starts_with("TCP connection"));
    }
}
