//! Generation-vendor plumbing for the storybook service.
//!
//! This crate knows how to talk to text- and image-generation gateways and how
//! to make sense of what they send back:
//!
//! - [`config`]: per-task vendor configuration (`{type, apiUrl, apiKey, model}`)
//! - [`remote`]: chat-completion and image-generation request builders
//! - [`normalize`]: image/text extraction from heterogeneous vendor replies
//! - [`image_size`]: best-effort shrinking of reference images
//! - [`prompt`]: prompt assembly behind the [`PromptBuilder`] trait
//! - [`storyboard`]: parsing of split-script replies
//!
//! All network traffic goes through [`utils::ResilientClient`].
//!
//! # Example
//!
//! ```rust,ignore
//! use genai::{ImageClient, ImageJob, VendorConfig};
//!
//! let config: VendorConfig = serde_json::from_value(payload["imageApiConfig"].clone())?;
//! let image = ImageClient::new(&client, &config)?
//!     .generate(&ImageJob { prompt, image_size: "1024x1024", aspect_ratio: "4:3", reference_images: &[] }, &cancel)
//!     .await?;
//! println!("{} via {}", image.uri.len(), image.rule);
//! ```

pub mod config;
pub mod error;
pub mod image_size;
pub mod normalize;
pub mod prompt;
pub mod remote;
pub mod storyboard;

pub use config::{Vendor, VendorConfig};
pub use error::{GenAiError, Result};
pub use image_size::ImageSizeReducer;
pub use normalize::{extract_image, extract_text, ExtractedImage};
pub use prompt::{Character, DefaultPromptBuilder, PageSpec, PromptBuilder, ScriptSource};
pub use remote::{
    ChatClient, ChatCompletionRequest, ChatMessage, ContentPart, ImageClient, ImageJob,
    MessageContent,
};
pub use storyboard::{parse_storyboards, Storyboard};
