//! Vendor response shapes seen in the wild, and end-to-end generation over a
//! scripted transport.

use async_trait::async_trait;
use genai::{extract_image, ChatClient, ChatCompletionRequest, ChatMessage, GenAiError, ImageClient, ImageJob, VendorConfig};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utils::{HttpReply, OutboundRequest, ResilientClient, RetryPolicy, Transport, TransportError};

const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

fn chat_reply(message: Value) -> Value {
    json!({"id": "chatcmpl-1", "choices": [{"index": 0, "message": message}]})
}

#[test]
fn test_documented_shapes_yield_data_uri() {
    let shapes = vec![
        (
            "content.image_url",
            chat_reply(json!({"content": [
                {"type": "text", "text": "done"},
                {"type": "image_url", "image_url": {"url": format!("data:image/png;base64,{PIXEL}")}}
            ]})),
        ),
        (
            "content.source.data",
            chat_reply(json!({"content": [
                {"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": PIXEL}}
            ]})),
        ),
        (
            "content.image.data",
            chat_reply(json!({"content": [{"image": {"data": PIXEL}, "index": 0}]})),
        ),
        (
            "content.image.image_bytes",
            chat_reply(json!({"content": [{"image": {"image_bytes": PIXEL}, "index": 0}]})),
        ),
        (
            "content.embedded_data_uri",
            chat_reply(json!({"content": format!("Here it is: ![img](data:image/png;base64,{PIXEL}) enjoy")})),
        ),
        (
            "parts.inline_data",
            chat_reply(json!({"parts": [{"inline_data": {"mime_type": "image/png", "data": PIXEL}}]})),
        ),
        (
            "parts.inlineData",
            json!({"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": PIXEL}}]}}]}),
        ),
        (
            "parts.image.image_bytes",
            chat_reply(json!({"parts": [{"image": {"image_bytes": PIXEL}}]})),
        ),
        ("data.b64_json", json!({"created": 1, "data": [{"b64_json": PIXEL}]})),
        (
            "predictions.bytesBase64Encoded",
            json!({"predictions": [{"bytesBase64Encoded": PIXEL, "mimeType": "image/png"}]}),
        ),
    ];

    for (expected_rule, body) in shapes {
        let image = extract_image(&body).unwrap_or_else(|e| panic!("{expected_rule}: {e}"));
        assert_eq!(image.rule, expected_rule);
        assert!(image.uri.starts_with("data:image/"), "{expected_rule}");
        assert!(image.uri.ends_with(PIXEL), "{expected_rule}");
    }
}

#[test]
fn test_url_shapes_pass_through() {
    for body in [
        json!({"data": [{"url": "https://cdn.test/1.png"}]}),
        json!({"image_url": "https://cdn.test/1.png"}),
        json!({"imageUrl": "https://cdn.test/1.png"}),
        chat_reply(json!({"content": [{"url": "https://cdn.test/1.png"}]})),
    ] {
        assert_eq!(extract_image(&body).unwrap().uri, "https://cdn.test/1.png");
    }
}

#[test]
fn test_unknown_shapes_fail_loudly() {
    for body in [
        json!({}),
        json!({"choices": []}),
        json!({"choices": [{"message": {"content": "I can't draw that."}}]}),
        json!({"data": [{"revised_prompt": "a rabbit"}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "no image"}]}}]}),
    ] {
        assert!(matches!(extract_image(&body), Err(GenAiError::NoImageFound)), "{body}");
    }
}

/// Answers every request with the same body and remembers what it was sent.
struct FixedTransport {
    status: u16,
    body: String,
    seen: Mutex<Vec<OutboundRequest>>,
}

impl FixedTransport {
    fn new(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for FixedTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        _timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(HttpReply::new(self.status, self.body.clone()))
    }
}

#[tokio::test]
async fn test_image_client_end_to_end() {
    let transport = FixedTransport::new(200, json!({"data": [{"b64_json": PIXEL}]}));
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());
    let config = VendorConfig::new("volcengine", "https://ark.test/api/v3", "sk-volc", "seedream");

    let image = ImageClient::new(&client, &config)
        .unwrap()
        .generate(
            &ImageJob {
                prompt: "a rabbit",
                image_size: "1024x1024",
                aspect_ratio: "1:1",
                reference_images: &[],
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(image.uri, format!("data:image/png;base64,{PIXEL}"));

    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url, "https://ark.test/api/v3/images/generations");
    assert!(seen[0]
        .headers
        .contains(&("Authorization".to_string(), "Bearer sk-volc".to_string())));
    assert_eq!(seen[0].body["size"], "1024x1024");
}

#[tokio::test]
async fn test_image_client_reports_missing_image() {
    let transport = FixedTransport::new(200, json!({"data": []}));
    let client = ResilientClient::new(transport, RetryPolicy::default());
    let config = VendorConfig::new("openai", "https://api.test/v1", "k", "dall-e-3");

    let err = ImageClient::new(&client, &config)
        .unwrap()
        .generate(
            &ImageJob {
                prompt: "a rabbit",
                image_size: "1024x1024",
                aspect_ratio: "1:1",
                reference_images: &[],
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenAiError::NoImageFound));
}

#[tokio::test]
async fn test_chat_client_surfaces_client_errors() {
    let transport = FixedTransport::new(401, json!({"error": {"message": "bad key"}}));
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());
    let config = VendorConfig::new("openai", "https://api.test/v1", "k", "gpt-4o");

    let err = ChatClient::new(&client, &config)
        .unwrap()
        .complete(
            &ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user_text("hi")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        GenAiError::Gateway(gateway) => assert_eq!(gateway.status_code(), Some(401)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.seen.lock().unwrap().len(), 1);
}
