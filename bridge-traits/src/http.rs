//! HTTP Client Abstraction
//!
//! The file hub is reached through this trait so hosts can supply their own
//! stack (OkHttp on Android, reqwest on desktop) and tests can script replies.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Outgoing request, assembled with the builder methods
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Overrides the client-wide request timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a single `name=value` cookie.
    pub fn cookie(self, name: &str, value: &str) -> Self {
        self.header("Cookie", format!("{}={}", name, value))
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// A complete server answer. Non-2xx statuses are responses, not errors.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Exponential backoff for transport failures and retryable statuses
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt. Used for exchanges whose retry is owned by the caller.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the given zero-based retry: `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Async HTTP client
///
/// Transport failures (no response at all) must be reported as
/// [`BridgeError::Network`](crate::error::BridgeError::Network) so callers
/// can tell them apart from server answers.
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
///
/// async fn reachable(client: &dyn HttpClient) -> bool {
///     let request = HttpRequest::new(HttpMethod::Get, "https://hub.example.com/");
///     client.execute(request).await.is_ok()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute with the implementation's default retry behaviour
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute with an explicit retry policy.
    ///
    /// The default ignores the policy and makes one call to `execute`.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_request_builder() {
        let request = HttpRequest::new(HttpMethod::Put, "https://hub.example.com/api/upload/chunk")
            .cookie("filehub_session", "abc")
            .header("Content-Type", "application/octet-stream")
            .body(Bytes::from_static(b"chunk"))
            .timeout(Duration::from_secs(30));

        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(
            request.headers.get("Cookie").map(String::as_str),
            Some("filehub_session=abc")
        );
        assert_eq!(request.body.as_deref(), Some(&b"chunk"[..]));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_success_range() {
        let response = |status| HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        };

        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(304).is_success());
        assert!(!response(503).is_success());
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(30), Duration::from_secs(30));

        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
