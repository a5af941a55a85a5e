//! HTTP transport with timeout and bounded retry.
//!
//! Transient failures (timeouts, connection errors, 5xx and any explicitly
//! configured status) are retried with a fixed sleep between attempts.
//! Every other non-2xx response is returned to the caller immediately.

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Fixed sleep between attempts
    pub retry_backoff: Duration,
    /// Additional non-5xx statuses treated as transient
    pub retry_statuses: Vec<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_retries: 5,
            retry_backoff: Duration::from_millis(1000),
            retry_statuses: Vec::new(),
        }
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,
    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),
    /// The server answered with a non-2xx status
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    /// Any other request failure (invalid URL, body encoding, ...)
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self, retry_statuses: &[u16]) -> bool {
        match self {
            TransportError::Timeout | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => {
                (500..600).contains(status) || retry_statuses.contains(status)
            }
            TransportError::Request(_) => false,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as lossy UTF-8, for diagnostics.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client with retry.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send a request, retrying transient failures.
    pub async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err)
                    if attempt <= self.config.max_retries
                        && err.is_transient(&self.config.retry_statuses) =>
                {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %err,
                        "Transient request failure, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(err) => {
                    debug!(
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        error = %err,
                        "Request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout.is_transient(&[]));
        assert!(TransportError::Connect("refused".into()).is_transient(&[]));
        assert!(TransportError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient(&[]));
        assert!(!TransportError::Status {
            status: 404,
            body: String::new()
        }
        .is_transient(&[]));
        assert!(!TransportError::Request("bad url".into()).is_transient(&[]));
    }

    #[test]
    fn test_configured_status_is_transient() {
        let err = TransportError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert!(!err.is_transient(&[]));
        assert!(err.is_transient(&[408, 429]));
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::get("https://x/api")
            .query("appId", "A")
            .header("Accept", "application/json");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query, vec![("appId".to_string(), "A".to_string())]);
        assert_eq!(request.headers.len(), 1);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_empty_response_body() {
        let response = HttpResponse {
            status: 204,
            body: b"  \n".to_vec(),
        };
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let client = HttpClient::new(HttpConfig {
            timeout: Duration::from_millis(200),
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            retry_statuses: Vec::new(),
        })
        .unwrap();

        // Port 9 (discard) on loopback is closed on test machines.
        let result = client.request(&HttpRequest::get("http://127.0.0.1:9/")).await;
        assert!(matches!(
            result,
            Err(TransportError::Connect(_)) | Err(TransportError::Timeout)
        ));
    }
}
