//! Vendor request builders.
//!
//! - [`chat`]: OpenAI-compatible chat completions (text generation)
//! - [`images`]: image generation across vendors and endpoint styles
//!
//! Both go through the shared [`ResilientClient`], so retries, timeouts and
//! cancellation behave the same for every vendor.

pub mod chat;
pub mod images;

pub use chat::{ChatClient, ChatCompletionRequest, ChatMessage, ContentPart, MessageContent};
pub use images::{
    collect_reference_images, image_dimensions, preset_size, ImageClient, ImageDimensions,
    ImageJob,
};

use crate::config::VendorConfig;
use crate::error::Result;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use utils::{OutboundRequest, ResilientClient};

/// POST `body` to `url` with the vendor's bearer key.
pub(crate) async fn post_json(
    client: &ResilientClient,
    config: &VendorConfig,
    url: String,
    body: Value,
    cancel: &CancellationToken,
) -> Result<Value> {
    let request = OutboundRequest::post(url, body).bearer(&config.api_key);

    debug!(
        url = %request.url,
        vendor = %config.vendor_type,
        model = %config.model,
        body_bytes = request.body_len(),
        "Sending vendor request"
    );

    Ok(client.call(&request, cancel).await?)
}
