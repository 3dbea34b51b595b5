//! Extraction rules, one per known vendor shape.
//!
//! Each rule inspects a single JSON node and returns the image as a URI
//! (`data:<mime>;base64,...` or a plain URL). Rules never look at siblings,
//! so adding a shape means appending a rule.

use serde_json::Value;

const DEFAULT_MIME: &str = "image/png";

/// A named extraction rule.
pub(crate) struct Rule {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<String>,
}

/// Rules for elements of an array-valued `message.content`.
pub(crate) const CONTENT_PART_RULES: &[Rule] = &[
    Rule {
        name: "content.image_url",
        extract: |part| {
            if type_is(part, "image_url") {
                non_empty(part, "/image_url/url").map(str::to_string)
            } else {
                None
            }
        },
    },
    Rule {
        name: "content.source.data",
        extract: |part| {
            if !type_is(part, "image") {
                return None;
            }
            let data = non_empty(part, "/source/data")?;
            let mime = non_empty(part, "/source/media_type").unwrap_or(DEFAULT_MIME);
            Some(data_uri(mime, data))
        },
    },
    Rule {
        name: "content.image.data",
        extract: |part| non_empty(part, "/image/data").map(png),
    },
    Rule {
        name: "content.image.image_bytes",
        extract: |part| non_empty(part, "/image/image_bytes").map(png),
    },
    Rule {
        name: "content.data",
        extract: |part| {
            if type_is(part, "image") {
                non_empty(part, "/data").map(png)
            } else {
                None
            }
        },
    },
    Rule {
        name: "content.url",
        extract: |part| non_empty(part, "/url").map(str::to_string),
    },
    Rule {
        name: "content.b64_json",
        extract: |part| non_empty(part, "/b64_json").map(png),
    },
];

/// Rules for elements of `message.parts`.
pub(crate) const PART_RULES: &[Rule] = &[
    Rule {
        name: "parts.inline_data",
        extract: |part| {
            let data = non_empty(part, "/inline_data/data")?;
            let mime = non_empty(part, "/inline_data/mime_type").unwrap_or(DEFAULT_MIME);
            Some(data_uri(mime, data))
        },
    },
    Rule {
        name: "parts.inlineData",
        extract: |part| {
            let data = non_empty(part, "/inlineData/data")?;
            let mime = non_empty(part, "/inlineData/mimeType").unwrap_or(DEFAULT_MIME);
            Some(data_uri(mime, data))
        },
    },
    Rule {
        name: "parts.image.image_bytes",
        extract: |part| {
            let data = non_empty(part, "/image/image_bytes")?;
            let mime = non_empty(part, "/image/mime_type").unwrap_or(DEFAULT_MIME);
            Some(data_uri(mime, data))
        },
    },
    Rule {
        name: "parts.image.data",
        extract: |part| {
            let data = non_empty(part, "/image/data")?;
            let mime = non_empty(part, "/image/mime_type").unwrap_or(DEFAULT_MIME);
            Some(data_uri(mime, data))
        },
    },
];

/// Rules for elements of a top-level `data` array.
pub(crate) const DATA_ITEM_RULES: &[Rule] = &[
    Rule {
        name: "data.url",
        extract: |item| non_empty(item, "/url").map(str::to_string),
    },
    Rule {
        name: "data.b64_json",
        extract: |item| non_empty(item, "/b64_json").map(png),
    },
];

/// Rules applied to the whole response body, after everything else.
pub(crate) const TOP_LEVEL_RULES: &[Rule] = &[
    Rule {
        name: "image_url",
        extract: |body| non_empty(body, "/image_url").map(str::to_string),
    },
    Rule {
        name: "imageUrl",
        extract: |body| non_empty(body, "/imageUrl").map(str::to_string),
    },
    Rule {
        name: "predictions.bytesBase64Encoded",
        extract: |body| non_empty(body, "/predictions/0/bytesBase64Encoded").map(png),
    },
];

/// First rule that matches any element, element-major.
pub(crate) fn scan(items: &[Value], rules: &[Rule]) -> Option<(String, &'static str)> {
    items.iter().find_map(|item| {
        rules
            .iter()
            .find_map(|rule| (rule.extract)(item).map(|uri| (uri, rule.name)))
    })
}

/// String at a JSON pointer, if present and non-empty.
pub(crate) fn non_empty<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn type_is(part: &Value, tag: &str) -> bool {
    part.get("type").and_then(Value::as_str) == Some(tag)
}

fn png(data: &str) -> String {
    data_uri(DEFAULT_MIME, data)
}

fn data_uri(mime: &str, data: &str) -> String {
    format!("data:{};base64,{}", mime, data)
}
