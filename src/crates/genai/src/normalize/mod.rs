//! Response normalization.
//!
//! Gateways wrap generated images in many different JSON shapes, and the same
//! vendor renames fields between releases. [`extract_image`] walks an ordered
//! list of independent rules and returns the first hit:
//!
//! 1. `message.content` as an array of parts
//! 2. `message.content` as a string with an embedded `data:image/...` URI
//! 3. `message.parts` (Gemini-native)
//! 4. top-level `data[]`, `image_url`, `imageUrl`, `predictions[0]`
//!
//! where `message` is `choices[0].message`, else `candidates[0].content`.

mod rules;

use crate::error::{GenAiError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use rules::{non_empty, scan, CONTENT_PART_RULES, DATA_ITEM_RULES, PART_RULES, TOP_LEVEL_RULES};

/// An image pulled out of a vendor response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// `data:<mime>;base64,...` or a plain URL.
    pub uri: String,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

impl ExtractedImage {
    pub fn is_data_uri(&self) -> bool {
        self.uri.starts_with("data:")
    }
}

static EMBEDDED_DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:image/[^;]+;base64,[A-Za-z0-9+/=]+").unwrap());

/// Locate the assistant message in a chat-style response.
fn message(body: &Value) -> Option<&Value> {
    body.pointer("/choices/0/message")
        .filter(|m| !m.is_null())
        .or_else(|| body.pointer("/candidates/0/content").filter(|m| !m.is_null()))
}

/// Extract a single generated image from `body`.
///
/// Every rule is tried before giving up; an unrecognised shape is
/// [`GenAiError::NoImageFound`], never an empty string.
pub fn extract_image(body: &Value) -> Result<ExtractedImage> {
    let found = message(body)
        .and_then(image_from_message)
        .or_else(|| image_from_top_level(body));

    match found {
        Some((uri, rule)) => {
            debug!(rule, uri_len = uri.len(), "Extracted image from response");
            Ok(ExtractedImage { uri, rule })
        }
        None => {
            warn!(shape = %describe_shape(body), "No image found in response");
            Err(GenAiError::NoImageFound)
        }
    }
}

fn image_from_message(message: &Value) -> Option<(String, &'static str)> {
    match message.get("content") {
        Some(Value::Array(parts)) => {
            if let Some(hit) = scan(parts, CONTENT_PART_RULES) {
                return Some(hit);
            }
        }
        Some(Value::String(text)) => {
            if let Some(m) = EMBEDDED_DATA_URI.find(text) {
                return Some((m.as_str().to_string(), "content.embedded_data_uri"));
            }
        }
        _ => {}
    }

    message
        .get("parts")
        .and_then(Value::as_array)
        .and_then(|parts| scan(parts, PART_RULES))
}

fn image_from_top_level(body: &Value) -> Option<(String, &'static str)> {
    if let Some(items) = body.get("data").and_then(Value::as_array) {
        if let Some(hit) = scan(items, DATA_ITEM_RULES) {
            return Some(hit);
        }
    }

    TOP_LEVEL_RULES
        .iter()
        .find_map(|rule| (rule.extract)(body).map(|uri| (uri, rule.name)))
}

/// Extract the assistant's text reply from `body`.
///
/// Reads `choices[0].message.content` (a string, or the `text` parts of an
/// array joined by newlines), else the `text` of `candidates[0].content.parts`.
pub fn extract_text(body: &Value) -> Result<String> {
    let text = match body.pointer("/choices/0/message/content") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Array(parts)) => join_text(parts, "/text"),
        _ => None,
    }
    .or_else(|| {
        body.pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .and_then(|parts| join_text(parts, "/text"))
    });

    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(GenAiError::NoTextFound),
    }
}

fn join_text(parts: &[Value], pointer: &str) -> Option<String> {
    let texts: Vec<&str> = parts.iter().filter_map(|p| non_empty(p, pointer)).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// Top-level keys of a response, for diagnostics without dumping payloads.
fn describe_shape(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("{{{}}}", keys.join(", "))
        }
        Value::Array(items) => format!("[{} items]", items.len()),
        other => other.to_string().chars().take(64).collect(),
    }
}
