//! Image generation across vendors.
//!
//! | vendor | model | endpoint |
//! |---|---|---|
//! | `openai` | gemini-family, `apiEndpoint = "chat"` | `chat/completions` |
//! | `openai` | gemini-family, with references | `images/edits` |
//! | `openai` | gemini-family, no references | `images/generations` |
//! | `openai` | other | `images/generations` (`size`, `quality`) |
//! | `volcengine` | any | `images/generations` (`size`) |
//! | `google-imagen` | any | `apiUrl` as given (`instances`/`parameters`) |

use super::chat::{ContentPart, MessageContent};
use crate::config::{Vendor, VendorConfig};
use crate::error::{GenAiError, Result};
use crate::image_size::ImageSizeReducer;
use crate::normalize::{extract_image, ExtractedImage};
use crate::prompt::Character;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use utils::ResilientClient;

/// Reference images above this size are shrunk first.
pub const MAX_SINGLE_REFERENCE_BYTES: usize = 2 * 1024 * 1024;

/// Total size of all references attached to one request.
pub const MAX_TOTAL_REFERENCE_BYTES: usize = 8 * 1024 * 1024;

const REFERENCE_NOTE: &str = "Character reference images follow. Characters in the generated \
                              image must match their appearance exactly:";

/// Pixel dimensions, multiples of 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    /// `"WIDTHxHEIGHT"`
    pub fn size_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Derive output dimensions from a base size (`"1024x1024"`) and an aspect
/// ratio (`"16:9"`).
///
/// The base width becomes the longer side; both sides are rounded to the
/// nearest multiple of 64.
pub fn image_dimensions(base_size: &str, aspect_ratio: &str) -> ImageDimensions {
    let base = leading_number(base_size).unwrap_or(1024) as f64;

    let ratio = aspect_ratio
        .split_once(':')
        .and_then(|(w, h)| Some((w.trim().parse::<f64>().ok()?, h.trim().parse::<f64>().ok()?)))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .map(|(w, h)| w / h)
        .unwrap_or(1.0);

    let (width, height) = if ratio >= 1.0 {
        (base, (base / ratio).round())
    } else {
        ((base * ratio).round(), base)
    };

    ImageDimensions {
        width: round_to_64(width),
        height: round_to_64(height),
    }
}

/// Map a pixel size onto the `1K`/`HD`/`4K` presets some gateways expect.
pub fn preset_size(pixel_size: &str) -> &'static str {
    let width = leading_number(pixel_size).unwrap_or(1024);
    if width >= 2048 {
        "4K"
    } else if width >= 1280 {
        "HD"
    } else {
        "1K"
    }
}

fn leading_number(size: &str) -> Option<u32> {
    size.split('x').next()?.trim().parse().ok().filter(|n| *n > 0)
}

fn round_to_64(value: f64) -> u32 {
    (((value / 64.0).round() as u32) * 64).max(64)
}

/// Gather character references plus the previous page, within the size budget.
///
/// Images over [`MAX_SINGLE_REFERENCE_BYTES`] are shrunk with `reducer`; images
/// that would push the total over [`MAX_TOTAL_REFERENCE_BYTES`] are skipped.
/// Character references take priority over `previous_image`.
pub fn collect_reference_images(
    characters: &[Character],
    previous_image: Option<&str>,
    reducer: &ImageSizeReducer,
) -> Vec<String> {
    let mut selected = Vec::new();
    let mut total = 0usize;

    for character in characters {
        for reference in &character.reference_images {
            let image = if reference.len() > MAX_SINGLE_REFERENCE_BYTES {
                debug!(character = %character.name, bytes = reference.len(), "Shrinking reference image");
                reducer.reduce(reference)
            } else {
                reference.clone()
            };

            if total + image.len() <= MAX_TOTAL_REFERENCE_BYTES {
                total += image.len();
                selected.push(image);
            } else {
                info!(character = %character.name, "Skipping reference image, size budget reached");
            }
        }
    }

    if let Some(previous) = previous_image.filter(|p| !p.is_empty()) {
        if total + previous.len() <= MAX_TOTAL_REFERENCE_BYTES {
            total += previous.len();
            selected.push(previous.to_string());
        } else {
            info!("Skipping previous page image, size budget reached");
        }
    }

    debug!(count = selected.len(), total_bytes = total, "Collected reference images");
    selected
}

/// One image to generate.
#[derive(Debug, Clone, Copy)]
pub struct ImageJob<'a> {
    pub prompt: &'a str,
    /// Base size such as `"1024x1024"`.
    pub image_size: &'a str,
    /// Aspect ratio such as `"4:3"`.
    pub aspect_ratio: &'a str,
    /// Data URIs attached for image-to-image generation.
    pub reference_images: &'a [String],
}

/// Image-generation client for one vendor configuration.
pub struct ImageClient<'a> {
    client: &'a ResilientClient,
    config: &'a VendorConfig,
    vendor: Vendor,
}

impl<'a> ImageClient<'a> {
    pub fn new(client: &'a ResilientClient, config: &'a VendorConfig) -> Result<Self> {
        config.validate()?;
        let vendor = config
            .vendor()
            .ok_or_else(|| GenAiError::UnsupportedVendor(config.vendor_type.clone()))?;
        Ok(Self {
            client,
            config,
            vendor,
        })
    }

    /// Build the target url and JSON body for `job`. Pure.
    pub fn build_request(&self, job: &ImageJob<'_>) -> (String, Value) {
        let config = self.config;
        let dimensions = image_dimensions(job.image_size, job.aspect_ratio);

        match self.vendor {
            Vendor::GoogleImagen => (
                config.api_url.clone(),
                json!({
                    "instances": [{"prompt": job.prompt}],
                    "parameters": {"sampleCount": 1},
                }),
            ),
            Vendor::OpenAi if config.is_gemini_model() && config.uses_chat_endpoint() => (
                config.endpoint("chat/completions"),
                json!({
                    "model": config.model,
                    "messages": [{"role": "user", "content": self.chat_content(job)}],
                }),
            ),
            Vendor::OpenAi if config.is_gemini_model() => {
                let image_config = json!({
                    "aspect_ratio": job.aspect_ratio,
                    "image_size": preset_size(job.image_size),
                });
                if job.reference_images.is_empty() {
                    (
                        config.endpoint("images/generations"),
                        json!({
                            "model": config.model,
                            "prompt": job.prompt,
                            "image_config": image_config,
                        }),
                    )
                } else {
                    (
                        config.endpoint("images/edits"),
                        json!({
                            "model": config.model,
                            "prompt": job.prompt,
                            "image": job.reference_images,
                            "image_config": image_config,
                        }),
                    )
                }
            }
            Vendor::OpenAi => (
                config.endpoint("images/generations"),
                json!({
                    "model": config.model,
                    "prompt": job.prompt,
                    "n": 1,
                    "size": dimensions.size_string(),
                    "quality": "standard",
                }),
            ),
            Vendor::Volcengine => (
                config.endpoint("images/generations"),
                json!({
                    "model": config.model,
                    "prompt": job.prompt,
                    "n": 1,
                    "size": dimensions.size_string(),
                }),
            ),
        }
    }

    /// Some relays only accept plain-string content for gemini-3 image models.
    fn chat_content(&self, job: &ImageJob<'_>) -> MessageContent {
        let model = self.config.model.to_lowercase();
        if job.reference_images.is_empty() && model.contains("gemini-3") && model.contains("image")
        {
            return MessageContent::Text(job.prompt.to_string());
        }

        let mut parts = Vec::with_capacity(job.reference_images.len() + 2);
        if !job.reference_images.is_empty() {
            parts.push(ContentPart::text(REFERENCE_NOTE));
            parts.extend(job.reference_images.iter().map(ContentPart::image));
        }
        parts.push(ContentPart::text(job.prompt));
        MessageContent::Parts(parts)
    }

    /// Generate one image and extract it from the vendor reply.
    pub async fn generate(
        &self,
        job: &ImageJob<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedImage> {
        let (url, body) = self.build_request(job);
        info!(
            vendor = %self.vendor,
            model = %self.config.model,
            references = job.reference_images.len(),
            "Generating image"
        );

        let reply = super::post_json(self.client, self.config, url, body, cancel).await?;
        extract_image(&reply)
    }
}
