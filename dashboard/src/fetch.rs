use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::records::{NormalizeError, json_kind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no API URL configured")]
    MissingUrl,
    #[error("failed to fetch data: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to fetch data: server returned HTTP {0}")]
    Status(u16),
    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Body(#[from] NormalizeError),
}

/// Pulls the raw log rows from the kronicler logs endpoint.
#[derive(Clone)]
pub struct LogFetcher {
    client: Client,
}

impl LogFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// One GET against `url`. The body must be a JSON array; rows inside it
    /// are validated later, one at a time.
    pub async fn fetch(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::MissingUrl);
        }

        debug!("fetching logs from {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(rows) => Ok(rows),
            other => Err(NormalizeError::NotAnArray(json_kind(&other)).into()),
        }
    }
}

impl Default for LogFetcher {
    fn default() -> Self {
        Self::new()
    }
}
