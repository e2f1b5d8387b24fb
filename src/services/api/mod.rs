//! REST client plumbing shared by the permission source and the admin client
//!
//! This module wraps a `reqwest::Client` with:
//! - Bearer token authentication (token supplied after login)
//! - Per-request timeout from configuration
//! - Mapping of transport and HTTP failures onto [`BackendError`]
//! - Request statistics for monitoring
//!
//! Error messages are passed through the log sanitizer before they are stored
//! so that tokens echoed back by proxies never end up in logs or status fields.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::logging::sanitize_log_message;

pub mod payload;

pub use payload::*;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Backend base URL, e.g. `https://records.example.com`
    pub base_url: String,
    /// Session token sent as `Authorization: Bearer ..`
    pub token: Option<String>,
    /// Timeout applied to every request
    pub request_timeout: Duration,
    /// Permission listing endpoint
    pub permissions_path: String,
    /// Current-user profile endpoint
    pub profile_path: String,
    /// Role management endpoint
    pub roles_path: String,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
            permissions_path: "/api/permissions/".to_string(),
            profile_path: "/api/auth/me/".to_string(),
            roles_path: "/api/roles/".to_string(),
        }
    }
}

/// Errors talking to the records backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unauthorized: backend answered {0}")]
    Unauthorized(u16),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether a later attempt may succeed without any change on our side
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Connection(_) | BackendError::Timeout => true,
            BackendError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(sanitize_log_message(&err.to_string()))
        } else {
            BackendError::Connection(sanitize_log_message(&err.to_string()))
        }
    }
}

/// Request statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    /// Total number of requests sent
    pub total_requests: u64,
    /// Requests that produced a usable response
    pub successful_requests: u64,
    /// Requests that failed for any reason
    pub failed_requests: u64,
    /// Requests that timed out
    pub timeouts: u64,
    /// Moving average of response time in milliseconds
    pub avg_response_time_ms: f64,
}

/// Thin authenticated JSON client over the backend REST API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiClientConfig,
    token: Arc<RwLock<Option<String>>>,
    stats: Arc<RwLock<BackendStats>>,
}

impl ApiClient {
    /// Create a client, validating the base URL up front
    pub fn new(config: ApiClientConfig) -> Result<Self, BackendError> {
        if config.base_url.is_empty() {
            return Err(BackendError::InvalidRequest("Base URL cannot be empty".to_string()));
        }
        reqwest::Url::parse(&config.base_url).map_err(|e| {
            BackendError::InvalidRequest(format!("Invalid base URL {}: {}", config.base_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        let token = Arc::new(RwLock::new(config.token.clone()));

        Ok(Self {
            http,
            config,
            token,
            stats: Arc::new(RwLock::new(BackendStats::default())),
        })
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Replace the session token, e.g. after re-authentication
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn stats(&self) -> BackendStats {
        self.stats.read().clone()
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a JSON document and deserialize it
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let body = self.send(Method::GET, path, None::<&()>).await?;
        decode_json(&body)
    }

    /// GET a list endpoint, accepting both list shapes
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BackendError> {
        let body = self.send(Method::GET, path, None::<&()>).await?;
        decode_list(&body)
    }

    /// Send a JSON body and deserialize the JSON answer
    pub async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self.send(method, path, Some(body)).await?;
        decode_json(&response)
    }

    /// DELETE a resource; any success status is accepted
    pub async fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.send(Method::DELETE, path, None::<&()>).await.map(|_| ())
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, BackendError> {
        let start = Instant::now();
        let url = self.url(path);

        debug!(method = %method, url = %url, "Sending backend request");

        let result = self.execute(method, &url, body).await;
        self.update_stats(result.as_ref().err(), start.elapsed());

        debug!(
            url = %url,
            ok = result.is_ok(),
            duration_ms = %start.elapsed().as_millis(),
            "Backend request completed"
        );

        result
    }

    async fn execute<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<String, BackendError> {
        let token = self.token.read().clone();
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(BackendError::from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(BackendError::from_reqwest)?;

        if status.is_success() {
            return Ok(text);
        }

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BackendError::Unauthorized(status.as_u16())
            }
            _ => BackendError::Status {
                status: status.as_u16(),
                body: truncate_body(&sanitize_log_message(&text)),
            },
        })
    }

    fn update_stats(&self, error: Option<&BackendError>, duration: Duration) {
        let mut stats = self.stats.write();
        stats.total_requests += 1;

        match error {
            None => stats.successful_requests += 1,
            Some(error) => {
                stats.failed_requests += 1;
                if *error == BackendError::Timeout {
                    stats.timeouts += 1;
                }
            }
        }

        // EMA with alpha = 0.1
        let duration_ms = duration.as_secs_f64() * 1000.0;
        if stats.total_requests == 1 {
            stats.avg_response_time_ms = duration_ms;
        } else {
            stats.avg_response_time_ms = 0.1 * duration_ms + 0.9 * stats.avg_response_time_ms;
        }
    }
}

fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_base_url() {
        let config = ApiClientConfig {
            base_url: String::new(),
            ..ApiClientConfig::default()
        };
        let result = ApiClient::new(config);
        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
    }

    #[test]
    fn test_new_rejects_unparsable_base_url() {
        let config = ApiClientConfig {
            base_url: "records.example.com".to_string(),
            ..ApiClientConfig::default()
        };
        assert!(ApiClient::new(config).is_err());
    }

    #[test]
    fn test_url_joins_slashes() {
        let client = ApiClient::new(ApiClientConfig {
            base_url: "https://records.example.com/".to_string(),
            ..ApiClientConfig::default()
        })
        .unwrap();

        assert_eq!(
            client.url("/api/permissions/"),
            "https://records.example.com/api/permissions/"
        );
        assert_eq!(client.url("api/roles/3/"), "https://records.example.com/api/roles/3/");
    }

    #[test]
    fn test_token_replacement() {
        let client = ApiClient::new(ApiClientConfig::default()).unwrap();
        assert!(!client.has_token());

        client.set_token(Some("abc".to_string()));
        assert!(client.has_token());

        client.set_token(None);
        assert!(!client.has_token());
    }

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::Connection("refused".into()).is_transient());
        assert!(BackendError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!BackendError::Status { status: 404, body: String::new() }.is_transient());
        assert!(!BackendError::Unauthorized(401).is_transient());
        assert!(!BackendError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(BackendError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            BackendError::Status { status: 502, body: "Bad Gateway".into() }.to_string(),
            "Unexpected status 502: Bad Gateway"
        );
        assert_eq!(
            BackendError::Unauthorized(401).to_string(),
            "Unauthorized: backend answered 401"
        );
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");

        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_ERROR_BODY + 3);
    }

    #[tokio::test]
    async fn test_connection_failure_is_counted() {
        let client = ApiClient::new(ApiClientConfig {
            // Port 9 (discard) is closed on test hosts
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_millis(500),
            ..ApiClientConfig::default()
        })
        .unwrap();

        let result: Result<Vec<serde_json::Value>, _> = client.get_list("/api/permissions/").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_transient());

        let stats = client.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
    }
}
