//! Fetch JSON documents from third-party APIs.
//!
//! Transient failures (timeouts, refused connections, 5xx) are retried a
//! bounded number of times with a linearly increasing backoff. 4xx responses
//! fail immediately.

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound on how much of an error body is kept for diagnostics.
const MAX_ERROR_BODY: usize = 4 << 10;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl HttpError {
    /// Whether another attempt could reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            Self::Build(_) | Self::Decode { .. } | Self::Cancelled => false,
        }
    }
}

/// Shared client for all widgets that talk to public JSON APIs.
#[derive(Debug, Clone)]
pub struct JsonClient {
    http: reqwest::Client,
    retries: u32,
    backoff: Duration,
}

impl JsonClient {
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the underlying client cannot be
    /// created (e.g. the TLS backend fails to initialise).
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            http,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Number of extra attempts after the first one.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay; attempt `n` waits `n * backoff` before going out.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// GET `url` and decode the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// The last error seen once retries are exhausted, the first
    /// non-transient error, or [`HttpError::Cancelled`] when `cancel` fires
    /// first.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(HttpError::Cancelled),
            result = self.get_json_with_retry(url) => result,
        }
    }

    async fn get_json_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, HttpError> {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                tokio::time::sleep(self.backoff * attempt).await;
            }

            match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retries => {
                    tracing::debug!(
                        url,
                        attempt,
                        error = %err,
                        "retrying upstream request"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, HttpError> {
        let mut response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            // keep a little of the body for the logs, never for the user
            let mut body = Vec::new();
            while body.len() < MAX_ERROR_BODY {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        let room = MAX_ERROR_BODY - body.len();
                        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                    }
                    Ok(None) | Err(_) => break,
                }
            }

            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| HttpError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_classified() {
        let server_error = HttpError::Status {
            status: 503,
            url: "http://x".to_string(),
            body: String::new(),
        };
        let client_error = HttpError::Status {
            status: 404,
            url: "http://x".to_string(),
            body: String::new(),
        };

        assert!(server_error.is_transient());
        assert!(!client_error.is_transient());
        assert!(!HttpError::Cancelled.is_transient());
    }

    #[test]
    fn test_client_builds_with_defaults() {
        let client = JsonClient::new("dashboard-test/0.1").unwrap();

        assert_eq!(client.retries, DEFAULT_RETRIES);
        assert_eq!(client.backoff, DEFAULT_BACKOFF);

        let client = client
            .with_retries(5)
            .with_backoff(Duration::from_millis(10));
        assert_eq!(client.retries, 5);
        assert_eq!(client.backoff, Duration::from_millis(10));
    }
}
