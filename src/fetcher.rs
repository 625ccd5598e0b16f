//! ==============================================================================
//! fetcher.rs - device document fetcher
//! ==============================================================================
//!
//! purpose:
//!     pulls the latest reading for one device from the realtime database.
//!     every failure comes back as a FetchError value; nothing here panics or
//!     escapes to the poll loop as a fatal error.
//!
//! relationships:
//!     - used by: poller.rs (through the ReadingSource trait)
//!     - produces: domain.rs (Reading)
//!
//! wire format:
//!     GET {base_url}/devices/{device_id}.json
//!     {"timestamp": 1700000000, "suhu": 25.4, "rainvalue": 612, "ldrValue": 300, "pintu": 0}
//!
//! ==============================================================================

use crate::domain::{RawReading, Reading};

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a tick produced no reading.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Timeout, DNS failure, refused connection.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The database answered with a non-success status.
    #[error("source returned HTTP {0}")]
    Status(u16),

    /// The document does not exist (empty or `null` body).
    #[error("source has no data for this device")]
    Empty,

    /// A required field is missing or has the wrong type.
    #[error("malformed reading: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Unavailable("request timed out".to_string())
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}

/// Anything the poll loop can pull readings from.
pub trait ReadingSource {
    fn fetch(&self) -> impl Future<Output = Result<Reading, FetchError>> + Send;

    /// human readable origin, used in log lines
    fn describe(&self) -> String;
}

/// Parse a response body into a reading.
pub fn parse_body(body: &str) -> Result<Reading, FetchError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::Empty);
    }

    let raw: RawReading =
        serde_json::from_str(trimmed).map_err(|e| FetchError::Malformed(e.to_string()))?;

    Reading::try_from(raw).map_err(FetchError::Malformed)
}

/// Fetches the device document over HTTP.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, device_id: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unavailable(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, url: device_url(base_url, device_id) })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self) -> Result<Reading, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_body(&body)
    }
}

impl ReadingSource for HttpFetcher {
    async fn fetch(&self) -> Result<Reading, FetchError> {
        self.fetch_once().await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn device_url(base_url: &str, device_id: &str) -> String {
    format!("{}/devices/{}.json", base_url.trim_end_matches('/'), device_id)
}
