//! Configuration for the storybook server
//!
//! - [`server`]: TOML server configuration with environment overrides

pub mod server;

pub use server::{
    HttpConfig, QueueConfig, ServerConfig, ServerConfigError, ServerInfoConfig,
    DEFAULT_CONFIG_PATH,
};
