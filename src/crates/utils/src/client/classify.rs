//! Retry classification for failed outbound attempts.
//!
//! Pure decision logic: given what went wrong with one attempt, decide whether
//! another attempt can help. Rules are applied in priority order:
//!
//! 1. No response at all: retry on timeout / connection-reset / abort.
//! 2. HTTP 429: retry, with the longer rate-limit backoff.
//! 3. HTTP 5xx: retry.
//! 4. HTTP 4xx other than 408/429: never retry.
//! 5. Anything else: never retry.

use super::transport::{TransportError, TransportErrorKind};
use crate::error::GatewayError;

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "etimedout", "deadline"];

const NETWORK_MARKERS: &[&str] = &[
    "econnreset",
    "connection reset",
    "connection closed",
    "connection refused",
    "broken pipe",
    "socket",
    "network",
    "terminated",
    "abort",
];

/// Whether another attempt should be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is transient.
    Retry,
    /// The failure is permanent, or unknown (fail closed).
    NoRetry,
}

/// What kind of failure an attempt ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Attempt timed out (client side, or HTTP 408)
    Timeout,
    /// Connection reset, refused, or aborted
    Network,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError,
    /// HTTP 4xx
    ClientError,
    /// Nothing we recognise
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::RateLimited => "rate-limited",
            FailureKind::ServerError => "server-error",
            FailureKind::ClientError => "client-error",
            FailureKind::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

/// Result of classifying one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub decision: RetryDecision,
    pub kind: FailureKind,
}

impl Classification {
    fn retry(kind: FailureKind) -> Self {
        Self {
            decision: RetryDecision::Retry,
            kind,
        }
    }

    fn no_retry(kind: FailureKind) -> Self {
        Self {
            decision: RetryDecision::NoRetry,
            kind,
        }
    }

    /// Should the caller try again?
    pub fn should_retry(&self) -> bool {
        self.decision == RetryDecision::Retry
    }

    /// Rate-limited failures back off from a larger base delay.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == FailureKind::RateLimited
    }
}

/// The observable outcome of a failed attempt.
#[derive(Debug, Clone, Copy)]
pub enum AttemptFailure<'a> {
    /// The request never produced an HTTP response.
    NoResponse(&'a TransportError),
    /// The upstream answered with this status code.
    Status(u16),
}

/// Classify a failed attempt.
pub fn classify(failure: AttemptFailure<'_>) -> Classification {
    match failure {
        AttemptFailure::NoResponse(err) => classify_transport(err),
        AttemptFailure::Status(429) => Classification::retry(FailureKind::RateLimited),
        AttemptFailure::Status(408) => Classification::retry(FailureKind::Timeout),
        AttemptFailure::Status(status) if (500..=599).contains(&status) => {
            Classification::retry(FailureKind::ServerError)
        }
        AttemptFailure::Status(status) if (400..=499).contains(&status) => {
            Classification::no_retry(FailureKind::ClientError)
        }
        AttemptFailure::Status(_) => Classification::no_retry(FailureKind::Unclassified),
    }
}

/// Classify a [`GatewayError`] returned by one attempt.
///
/// Errors that are not HTTP outcomes (bad JSON, cancellation) are never retried.
pub fn classify_error(err: &GatewayError) -> Classification {
    match err {
        GatewayError::Status { status, .. } => classify(AttemptFailure::Status(*status)),
        GatewayError::Transport(transport) => classify(AttemptFailure::NoResponse(transport)),
        GatewayError::InvalidJson(_) | GatewayError::Cancelled => {
            Classification::no_retry(FailureKind::Unclassified)
        }
    }
}

fn classify_transport(err: &TransportError) -> Classification {
    match err.kind {
        TransportErrorKind::Timeout => return Classification::retry(FailureKind::Timeout),
        TransportErrorKind::Connect => return Classification::retry(FailureKind::Network),
        TransportErrorKind::Other => {}
    }

    let message = err.message.to_lowercase();
    if TIMEOUT_MARKERS.iter().any(|m| message.contains(m)) {
        Classification::retry(FailureKind::Timeout)
    } else if NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        Classification::retry(FailureKind::Network)
    } else {
        Classification::no_retry(FailureKind::Unclassified)
    }
}
