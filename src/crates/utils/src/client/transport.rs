//! Single-attempt HTTP transport.
//!
//! The [`Transport`] trait is the seam between retry policy and the wire. The
//! production implementation is [`ReqwestTransport`]; tests substitute scripted
//! transports.

use super::OutboundRequest;
use crate::error::{Result, UtilsError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONNECTION};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Raw reply to one attempt.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Coarse cause of a failure that produced no HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

/// An attempt that never produced an HTTP response.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };

        // reqwest hides the interesting part (e.g. "connection reset") in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::new(kind, message)
    }
}

/// Performs exactly one HTTP POST.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request once, giving up after `timeout`.
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpReply, TransportError>;
}

/// reqwest-backed transport that never reuses connections.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with pooling disabled.
    ///
    /// Upstream gateways tear idle sockets down without notice, so every attempt
    /// opens a fresh connection.
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(0);

        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|e| UtilsError::ClientError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpReply, TransportError> {
        let mut req = self
            .client
            .post(&request.url)
            .timeout(timeout)
            .header(CONNECTION, "close")
            .header(ACCEPT, "application/json")
            .json(&request.body);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpReply { status, body })
    }
}
