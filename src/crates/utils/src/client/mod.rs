//! Resilient outbound HTTP client.
//!
//! This module provides:
//! - [`RetryPolicy`]: attempt budget, backoff bases and per-attempt timeout
//! - [`OutboundRequest`]: a JSON POST with headers
//! - [`ResilientClient`]: one logical call with bounded retries
//! - Error classification ([`classify`]) and the [`Transport`] seam
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::client::{OutboundRequest, ResilientClient, RetryPolicy};
//!
//! let policy = RetryPolicy::default().with_max_attempts(5);
//! let client = ResilientClient::reqwest(policy, Some("storybook/0.1"))?;
//! let json = client.call(&request, &cancel).await?;
//! ```

pub mod classify;
pub mod transport;

pub use classify::{
    classify, classify_error, AttemptFailure, Classification, FailureKind, RetryDecision,
};
pub use transport::{HttpReply, ReqwestTransport, Transport, TransportError, TransportErrorKind};

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Retry and timeout settings for one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base for ordinary transient failures.
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,

    /// Backoff base after an HTTP 429.
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_base_delay: Duration,

    /// Hard deadline for each attempt.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            rate_limit_base_delay: default_rate_limit_delay(),
            timeout: default_timeout(),
        }
    }

    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff base for transient failures.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff base after a rate limit.
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_base_delay = delay;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, where the base is larger for rate limits.
    pub fn backoff_delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = if rate_limited {
            self.rate_limit_base_delay
        } else {
            self.base_delay
        };
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(3000)
}

fn default_rate_limit_delay() -> Duration {
    Duration::from_millis(5000)
}

fn default_timeout() -> Duration {
    Duration::from_millis(150_000)
}

/// A JSON POST to an upstream API.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub body: serde_json::Value,
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            body,
            headers: Vec::new(),
        }
    }

    /// Add a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <token>`.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Serialized body size, used for logging.
    pub fn body_len(&self) -> usize {
        serde_json::to_vec(&self.body).map(|b| b.len()).unwrap_or(0)
    }
}

/// HTTP client that retries transient failures with exponential backoff.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientClient {
    /// Create a client over any transport.
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Create a client backed by [`ReqwestTransport`].
    pub fn reqwest(policy: RetryPolicy, user_agent: Option<&str>) -> Result<Self> {
        let transport = ReqwestTransport::new(user_agent)?;
        Ok(Self::new(Arc::new(transport), policy))
    }

    /// Default policy used by [`ResilientClient::call`].
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Perform one logical call with the default policy.
    pub async fn call(
        &self,
        request: &OutboundRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<serde_json::Value, GatewayError> {
        self.call_with(request, &self.policy, cancel).await
    }

    /// Perform one logical call with an explicit policy.
    ///
    /// Returns the parsed JSON body of the first 2xx reply. Non-retryable
    /// failures are returned immediately; retryable ones are returned once the
    /// attempt budget is spent. Cancelling `cancel` aborts an in-flight attempt
    /// or backoff sleep with [`GatewayError::Cancelled`].
    pub async fn call_with(
        &self,
        request: &OutboundRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> std::result::Result<serde_json::Value, GatewayError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                outcome = self.attempt(request, policy.timeout) => outcome,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let err = match outcome {
                Ok(json) => {
                    info!(
                        url = %request.url,
                        attempt,
                        max_attempts,
                        elapsed_ms,
                        "Upstream call succeeded"
                    );
                    return Ok(json);
                }
                Err(err) => err,
            };

            let classification = classify_error(&err);
            warn!(
                url = %request.url,
                attempt,
                max_attempts,
                elapsed_ms,
                classification = %classification.kind,
                retry = classification.should_retry(),
                error = %err,
                "Upstream call failed"
            );

            if !classification.should_retry() {
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(
                    url = %request.url,
                    max_attempts,
                    "All retry attempts exhausted"
                );
                return Err(err);
            }

            let delay = policy.backoff_delay(attempt, classification.is_rate_limited());
            info!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Waiting before retry"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> std::result::Result<serde_json::Value, GatewayError> {
        let reply = tokio::time::timeout(timeout, self.transport.send(request, timeout))
            .await
            .map_err(|_| GatewayError::deadline(timeout))??;

        if !reply.is_success() {
            return Err(GatewayError::status(reply.status, reply.body));
        }

        serde_json::from_str(&reply.body).map_err(|e| GatewayError::InvalidJson(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes and records when each attempt happened.
    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<HttpReply, TransportError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<HttpReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _request: &OutboundRequest,
            _timeout: Duration,
        ) -> std::result::Result<HttpReply, TransportError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpReply::new(500, "script exhausted")))
        }
    }

    /// Never answers.
    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(
            &self,
            _request: &OutboundRequest,
            _timeout: Duration,
        ) -> std::result::Result<HttpReply, TransportError> {
            std::future::pending().await
        }
    }

    fn request() -> OutboundRequest {
        OutboundRequest::post("https://gateway.test/v1/chat/completions", serde_json::json!({}))
            .bearer("sk-test")
    }

    fn client(transport: Arc<dyn Transport>) -> ResilientClient {
        ResilientClient::new(transport, RetryPolicy::default())
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(3000));
        assert_eq!(policy.rate_limit_base_delay, Duration::from_millis(5000));
        assert_eq!(policy.timeout, Duration::from_millis(150_000));
    }

    #[test]
    fn test_backoff_delay_exponential() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1000));

        assert_eq!(policy.backoff_delay(1, false), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2, false), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3, false), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_delay_rate_limited_uses_larger_base() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(10));

        assert_eq!(policy.backoff_delay(1, true), Duration::from_millis(5000));
        assert_eq!(policy.backoff_delay(2, true), Duration::from_millis(10_000));
    }

    #[test]
    fn test_backoff_delay_does_not_overflow() {
        let policy = RetryPolicy::default();
        let _ = policy.backoff_delay(200, true);
    }

    #[test]
    fn test_outbound_request_headers() {
        let req = request().header("X-Trace", "abc");
        assert_eq!(req.headers.len(), 2);
        assert!(req
            .headers
            .contains(&("Authorization".to_string(), "Bearer sk-test".to_string())));
        assert_eq!(req.body_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::new(200, r#"{"ok":true}"#))]);
        let json = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(json["ok"], true);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_makes_exactly_one_call() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpReply::new(401, "invalid api key")),
            Ok(HttpReply::new(200, "{}")),
        ]);
        let err = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(401));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_network_failure_makes_exactly_one_call() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new(
            TransportErrorKind::Other,
            "invalid peer certificate",
        ))]);
        let err = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_exhaust_attempts_with_exponential_delays() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpReply::new(502, "bad gateway")),
            Ok(HttpReply::new(503, "unavailable")),
            Ok(HttpReply::new(500, "boom")),
        ]);
        let err = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(
            transport.gaps(),
            vec![Duration::from_millis(3000), Duration::from_millis(6000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backoff_ignores_base_delay() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpReply::new(429, "slow down")),
            Ok(HttpReply::new(429, "slow down")),
            Ok(HttpReply::new(200, r#"{"data":[]}"#)),
        ]);
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));
        let result = ResilientClient::new(transport.clone(), policy)
            .call(&request(), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(
            transport.gaps(),
            vec![Duration::from_millis(5000), Duration::from_millis(10_000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_connection_reset() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new(
                TransportErrorKind::Other,
                "connection reset by peer",
            )),
            Ok(HttpReply::new(200, r#"{"choices":[]}"#)),
        ]);
        let result = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.gaps(), vec![Duration::from_millis(3000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout_is_enforced() {
        let policy = RetryPolicy::default()
            .with_max_attempts(2)
            .with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let err = ResilientClient::new(Arc::new(HangingTransport), policy)
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
        // two 1s attempts plus one 3s backoff
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_json_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::new(200, "<html>"))]);
        let err = client(transport.clone())
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidJson(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let err = client(Arc::new(HangingTransport))
            .call(&request(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_backoff_sleep() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::new(503, "busy"))]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = client(transport.clone())
            .call(&request(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_calls_once() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::new(200, "{}"))]);
        let policy = RetryPolicy::default().with_max_attempts(0);
        let result = ResilientClient::new(transport.clone(), policy)
            .call(&request(), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.call_count(), 1);
    }
}
