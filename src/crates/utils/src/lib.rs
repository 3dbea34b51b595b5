//! Shared plumbing for the storybook service.
//!
//! This crate provides the outbound HTTP layer used by task executors and the
//! configuration helpers used by the server binary.
//!
//! # Modules
//!
//! ## Client (`client`)
//!
//! A resilient HTTP client that performs one logical call with bounded retries,
//! exponential backoff and a hard per-attempt timeout:
//!
//! ```rust,ignore
//! use utils::client::{OutboundRequest, ResilientClient, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ResilientClient::reqwest(RetryPolicy::default(), None)?;
//! let request = OutboundRequest::post("https://api.example.com/v1/chat/completions", body)
//!     .bearer("sk-...");
//!
//! let json = client.call(&request, &CancellationToken::new()).await?;
//! ```
//!
//! ## Config (`config`)
//!
//! Environment variable and config file helpers:
//!
//! ```rust,ignore
//! use utils::config::{get_env, load_optional_config};
//!
//! let config_path = get_env("CONFIG_PATH").unwrap_or_else(|_| "server.toml".into());
//! let config: Option<AppConfig> = load_optional_config(&config_path)?;
//! ```

pub mod client;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use client::{
    classify, classify_error, AttemptFailure, Classification, FailureKind, HttpReply,
    OutboundRequest, ReqwestTransport, ResilientClient, RetryDecision, RetryPolicy, Transport,
    TransportError, TransportErrorKind,
};
pub use config::{
    get_env, load_config_file, load_json_config, load_optional_config, load_toml_config,
    ConfigFormat,
};
pub use error::{GatewayError, Result, UtilsError};
