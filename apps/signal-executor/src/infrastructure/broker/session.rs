//! Venue HTTP session with retry logic.
//!
//! A session is built once at startup and handed to the venue adapter; it
//! owns the HTTP client, the base URL, the authentication headers and the
//! retry policy.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::retry::{ErrorCategory, ExponentialBackoff, RetryPolicy, categorize_status};
use crate::application::ports::VenueError;
use crate::observability::record_venue_retry;

/// Transport-level errors, after retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Client could not be built.
    #[error("Invalid session configuration: {0}")]
    Config(String),

    /// Network failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials refused.
    #[error("Authentication failed (HTTP {status})")]
    Unauthorized {
        /// HTTP status.
        status: u16,
    },

    /// Resource not found.
    #[error("Not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
        /// Response body.
        body: String,
    },

    /// Non-retryable error status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Rate limited beyond the retry budget.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Retry budget spent.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last_error: String,
    },

    /// Body could not be parsed.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),
}

impl From<SessionError> for VenueError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized { status } => Self::Auth {
                message: format!("HTTP {status}"),
            },
            SessionError::NotFound { path, .. } => Self::NotFound { id: path },
            SessionError::Status { status, body } => Self::Rejected {
                code: status.to_string(),
                message: body,
            },
            SessionError::JsonParse(message) => Self::Decode { message },
            SessionError::Config(message) | SessionError::Network(message) => {
                Self::Transport { message }
            }
            other @ (SessionError::RateLimited { .. } | SessionError::MaxRetriesExceeded { .. }) => {
                Self::Transport {
                    message: other.to_string(),
                }
            }
        }
    }
}

/// Connection parameters for a venue REST API.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Accept self-signed certificates (local gateways).
    pub accept_invalid_certs: bool,
}

/// Established venue session.
#[derive(Debug, Clone)]
pub struct VenueSession {
    venue: &'static str,
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl VenueSession {
    /// Build a session.
    pub fn new(venue: &'static str, config: &SessionConfig) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SessionError::Config(format!("header {name}: {e}")))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| SessionError::Config(format!("header {name}: {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SessionError::Config(e.to_string()))?;

        Ok(Self {
            venue,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        })
    }

    /// Base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// POST a JSON body.
    #[allow(clippy::future_not_send)]
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SessionError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// DELETE a resource.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    #[allow(clippy::future_not_send)]
    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, SessionError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            venue = self.venue,
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempts(),
                            "Network error, retrying"
                        );
                        record_venue_retry(self.venue, backoff.attempts());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SessionError::MaxRetriesExceeded {
                        attempts: backoff.attempts(),
                        last_error: e.to_string(),
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| SessionError::Network(e.to_string()))?;
                let text = if text.trim().is_empty() { "null" } else { &text };
                return serde_json::from_str(text).map_err(|e| SessionError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    let delay = match retry_after {
                        Some(secs) => backoff.next_backoff().map(|_| Duration::from_secs(secs)),
                        None => backoff.next_backoff(),
                    };
                    if let Some(delay) = delay {
                        tracing::warn!(
                            venue = self.venue,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        record_venue_retry(self.venue, backoff.attempts());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SessionError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            venue = self.venue,
                            status = status.as_u16(),
                            body = %error_body,
                            delay_ms = delay.as_millis(),
                            "Retryable error, retrying"
                        );
                        record_venue_retry(self.venue, backoff.attempts());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SessionError::MaxRetriesExceeded {
                        attempts: backoff.attempts(),
                        last_error: format!("HTTP {}: {error_body}", status.as_u16()),
                    });
                }
                ErrorCategory::NonRetryable => {
                    return Err(match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            SessionError::Unauthorized {
                                status: status.as_u16(),
                            }
                        }
                        StatusCode::NOT_FOUND => SessionError::NotFound {
                            path: path.to_string(),
                            body: error_body,
                        },
                        _ => SessionError::Status {
                            status: status.as_u16(),
                            body: error_body,
                        },
                    });
                }
            }
        }
    }
}
