//! Shared HTTP fetcher honoring the configured timeout and retry budget.
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Settings, RETRY_BACKOFF_STEP};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request timeout while fetching {0}")]
    Timeout(String),
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: StatusCode },
    #[error("error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Client(_) => false,
            FetchError::Timeout(_) | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retry_attempts: u32) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            retry_attempts: retry_attempts.max(1),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        Self::new(settings.fetch_timeout(), settings.retry_attempts)
    }

    async fn get_once(&self, url: &str) -> Result<String, FetchError> {
        let res = self.client.get(url).send().await.map_err(|e| classify(url, e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        res.text().await.map_err(|e| classify(url, e))
    }

    /// GET `url` as text, retrying transient failures with linear backoff.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            match self.get_once(url).await {
                Ok(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched");
                    return Ok(body);
                }
                Err(err) if err.is_retryable() && attempt < self.retry_attempts => {
                    warn!(url, attempt, error = %err, "request failed; retrying");
                    tokio::time::sleep(RETRY_BACKOFF_STEP * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: err,
        }
    }
}
