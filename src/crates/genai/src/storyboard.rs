//! Storyboard parsing.
//!
//! Chat models are asked to answer with blocks like
//!
//! ```text
//! 【分镜1】
//! **画面描述**：A rabbit under a tree
//! **故事文字**：Mimi looked up.
//! ```
//!
//! `## 分镜1` headings are accepted too, and `**` emphasis is stripped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:【分镜|##\s*分镜)(\d+)(?:】)?").unwrap());

static SCENE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\*\*|\s)*画面描述(?:\*\*|\s)*[：:]").unwrap());

static STORY_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\*\*|\s)*故事文字(?:\*\*|\s)*[：:]").unwrap());

/// One page of the split script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storyboard {
    pub id: u32,
    pub scene_description: String,
    pub story_text: String,
}

/// Extract storyboards in document order.
///
/// A block missing either field is skipped. An unparseable reply yields an
/// empty list; callers keep the raw text alongside.
pub fn parse_storyboards(content: &str) -> Vec<Storyboard> {
    let headings: Vec<(usize, usize, Option<u32>)> = HEADING
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.get(1).and_then(|m| m.as_str().parse().ok());
            Some((whole.start(), whole.end(), id))
        })
        .collect();

    let mut storyboards = Vec::with_capacity(headings.len());

    for (i, &(_, body_start, id)) in headings.iter().enumerate() {
        let body_end = headings
            .get(i + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(content.len());
        let body = &content[body_start..body_end];

        let Some(id) = id else { continue };
        if let Some(storyboard) = parse_block(id, body) {
            storyboards.push(storyboard);
        }
    }

    if storyboards.is_empty() {
        let preview: String = content.chars().take(200).collect();
        warn!(preview = %preview, "No storyboards found in reply");
    } else {
        debug!(count = storyboards.len(), "Parsed storyboards");
    }

    storyboards
}

fn parse_block(id: u32, body: &str) -> Option<Storyboard> {
    let scene = SCENE_LABEL.find(body)?;
    let story = STORY_LABEL.find_at(body, scene.end())?;

    Some(Storyboard {
        id,
        scene_description: clean(&body[scene.end()..story.start()]),
        story_text: clean(&body[story.end()..]),
    })
}

fn clean(text: &str) -> String {
    text.replace("**", "").trim().to_string()
}
