//! Prompt assembly.
//!
//! Prompt wording is product content rather than plumbing, so it sits behind
//! the [`PromptBuilder`] trait. [`DefaultPromptBuilder`] ships a neutral
//! English template set.

use serde::{Deserialize, Serialize};

/// A recurring character with optional reference images.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Base64 data URIs.
    #[serde(default)]
    pub reference_images: Vec<String>,
}

/// Input for a single picture-book page.
#[derive(Debug, Clone, Default)]
pub struct PageSpec<'a> {
    pub scene_description: &'a str,
    pub story_text: &'a str,
    pub style: &'a str,
    pub scene_index: u32,
    pub total_scenes: u32,
    pub story_title: &'a str,
    pub characters: &'a [Character],
}

/// Where a script is generated from.
#[derive(Debug, Clone, Copy)]
pub enum ScriptSource<'a> {
    /// Textbook page images attached to the request.
    Images(usize),
    /// Plain-text topics or exercises.
    Topics(&'a [String]),
}

/// Turns structured input into vendor prompt strings. Pure, no I/O.
pub trait PromptBuilder: Send + Sync {
    /// System prompt for script generation.
    fn script_system_prompt(&self) -> String;

    /// User prompt for script generation.
    fn script_user_prompt(&self, source: ScriptSource<'_>, plot_direction: &str) -> String;

    /// Prompt asking the model to split a script into storyboards.
    ///
    /// The reply must use `【分镜N】` headings with `画面描述：` and `故事文字：`
    /// fields so [`crate::storyboard::parse_storyboards`] can read it.
    fn split_prompt(&self, script: &str, storyboard_count: u32, keep_original: bool) -> String;

    /// Full prompt for one illustrated page.
    fn page_prompt(&self, page: &PageSpec<'_>) -> String;
}

/// Built-in prompt templates.
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptBuilder;

impl DefaultPromptBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl PromptBuilder for DefaultPromptBuilder {
    fn script_system_prompt(&self) -> String {
        "You are a children's picture-book author. Turn the material you are given into a \
         short, warm story script suitable for illustration."
            .to_string()
    }

    fn script_user_prompt(&self, source: ScriptSource<'_>, plot_direction: &str) -> String {
        let material = match source {
            ScriptSource::Images(count) => format!(
                "Read the {} attached textbook page image(s) and build the story around the \
                 knowledge they teach.",
                count
            ),
            ScriptSource::Topics(topics) => {
                let list: Vec<String> = topics
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("{}. {}", i + 1, t))
                    .collect();
                format!(
                    "Build the story around these topics:\n{}",
                    list.join("\n")
                )
            }
        };

        if plot_direction.trim().is_empty() {
            material
        } else {
            format!("{}\n\nPlot direction: {}", material, plot_direction.trim())
        }
    }

    fn split_prompt(&self, script: &str, storyboard_count: u32, keep_original: bool) -> String {
        let treatment = if keep_original {
            "Keep the original wording of the story text; do not rewrite it."
        } else {
            "Polish the story text so each page reads naturally aloud."
        };

        format!(
            "Split the following script into exactly {count} storyboards. {treatment}\n\
             Use this format for every storyboard:\n\n\
             【分镜1】\n画面描述：<what the illustration shows>\n故事文字：<text printed on the page>\n\n\
             Script:\n{script}",
            count = storyboard_count,
            treatment = treatment,
            script = script
        )
    }

    fn page_prompt(&self, page: &PageSpec<'_>) -> String {
        let mut prompt = scene_context(page.scene_index, page.total_scenes, page.story_title);

        prompt.push_str(&format!("Style: {}. ", style_prompt(page.style)));

        let characters = character_prompt(page.characters);
        if !characters.is_empty() {
            prompt.push_str(&characters);
            prompt.push(' ');
        }

        prompt.push_str(&format!("Scene: {}", page.scene_description.trim()));

        if !page.story_text.trim().is_empty() {
            prompt.push_str(&format!(
                "\nPage text (render in speech bubbles or a caption box): {}",
                page.story_text.trim()
            ));
        }

        prompt
    }
}

/// Position-aware framing that keeps consecutive pages visually consistent.
pub fn scene_context(scene_index: u32, total_scenes: u32, story_title: &str) -> String {
    let mut context = format!("[Scene {} of {}] ", scene_index, total_scenes);

    if !story_title.is_empty() {
        context.push_str(&format!("Story: \"{}\". ", story_title));
    }

    if scene_index == 1 {
        context.push_str("Opening scene - establish the setting and introduce main character. ");
    } else if scene_index == total_scenes {
        context.push_str("Final scene - conclusion of the story. ");
    } else {
        context.push_str("Continuation scene - maintain visual continuity with previous scenes. ");
    }

    context
}

/// Describe recurring characters so their appearance stays consistent.
pub fn character_prompt(characters: &[Character]) -> String {
    let described: Vec<String> = characters
        .iter()
        .filter(|c| !c.name.is_empty() || !c.description.is_empty())
        .map(|c| match (c.name.is_empty(), c.description.is_empty()) {
            (false, false) => format!("{} ({})", c.name, c.description),
            (false, true) => c.name.clone(),
            _ => c.description.clone(),
        })
        .collect();

    if described.is_empty() {
        String::new()
    } else {
        format!("Characters: {}.", described.join("; "))
    }
}

/// Expand a style tag into an art-direction phrase. Unknown tags pass through.
pub fn style_prompt(style: &str) -> String {
    match style {
        "pixar" => "3D animated film look, soft global illumination, expressive characters",
        "watercolor" => "hand-painted watercolor, soft edges, paper texture",
        "crayon" => "children's crayon drawing, bold strokes, bright colors",
        "flat" => "flat vector illustration, clean shapes, limited palette",
        "ghibli" => "hand-drawn anime background art, lush nature, gentle light",
        "" => "warm children's picture-book illustration",
        other => other,
    }
    .to_string()
}
