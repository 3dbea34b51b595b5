//! `generate-single-image` and `generate-images`: illustrated pages.

use async_trait::async_trait;
use genai::remote::images::{collect_reference_images, MAX_SINGLE_REFERENCE_BYTES};
use genai::{
    Character, ImageClient, ImageJob, ImageSizeReducer, PageSpec, PromptBuilder, VendorConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{parse_payload, require_config};
use crate::registry::{ExecutorContext, ExecutorError, TaskExecutor};
use crate::task::Task;

/// Settings shared by every page of a book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSettings {
    #[serde(default)]
    characters: Vec<Character>,
    #[serde(default = "default_style")]
    style: String,
    total_scenes: Option<u32>,
    #[serde(default)]
    story_title: String,
    #[serde(default)]
    previous_image_url: String,
    #[serde(default = "default_image_size")]
    image_size: String,
    #[serde(default = "default_aspect_ratio")]
    image_aspect_ratio: String,
    image_api_config: Option<VendorConfig>,
}

fn default_style() -> String {
    "pixar".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

fn default_scene_index() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SinglePayload {
    #[serde(default)]
    scene_description: String,
    #[serde(default)]
    story_text: String,
    #[serde(default = "default_scene_index")]
    scene_index: u32,
    /// Render a character sheet; the description is the prompt verbatim.
    #[serde(default)]
    is_character_generation: bool,
    #[serde(flatten)]
    settings: PageSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneInput {
    #[serde(default)]
    scene_description: String,
    #[serde(default)]
    story_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPayload {
    #[serde(default)]
    scenes: Vec<SceneInput>,
    #[serde(flatten)]
    settings: PageSettings,
}

/// One page to draw.
struct Page<'a> {
    scene_description: &'a str,
    story_text: &'a str,
    scene_index: u32,
    total_scenes: u32,
    is_character_generation: bool,
    /// Set only for pages after the first, see [`previous_page`].
    previous_image: Option<&'a str>,
}

/// The continuity reference for page `scene_index`: none for the first page
/// or when there is no earlier image.
fn previous_page(scene_index: u32, image_url: &str) -> Option<&str> {
    (scene_index > 1 && !image_url.trim().is_empty()).then_some(image_url)
}

/// A generated page.
struct RenderedPage {
    image_url: String,
    prompt: String,
}

/// Prompt assembly, reference shrinking and the vendor call for one page.
pub(crate) struct ImagePipeline {
    prompts: Arc<dyn PromptBuilder>,
    reducer: ImageSizeReducer,
}

impl ImagePipeline {
    pub(crate) fn new(prompts: Arc<dyn PromptBuilder>) -> Self {
        Self {
            prompts,
            reducer: ImageSizeReducer::default(),
        }
    }

    fn prompt(&self, settings: &PageSettings, page: &Page<'_>) -> String {
        if page.is_character_generation {
            return page.scene_description.to_string();
        }
        self.prompts.page_prompt(&PageSpec {
            scene_description: page.scene_description,
            story_text: page.story_text,
            style: &settings.style,
            scene_index: page.scene_index,
            total_scenes: page.total_scenes,
            story_title: &settings.story_title,
            characters: &settings.characters,
        })
    }

    /// Character references plus the previous page, shrunk off the async
    /// workers since decoding and re-encoding is CPU-bound.
    async fn references(
        &self,
        characters: &[Character],
        previous_image: Option<&str>,
    ) -> Result<Vec<String>, ExecutorError> {
        let oversized = characters
            .iter()
            .flat_map(|c| &c.reference_images)
            .any(|r| r.len() > MAX_SINGLE_REFERENCE_BYTES);

        if !oversized {
            return Ok(collect_reference_images(
                characters,
                previous_image,
                &self.reducer,
            ));
        }

        let characters = characters.to_vec();
        let previous = previous_image.map(str::to_string);
        let reducer = self.reducer.clone();
        tokio::task::spawn_blocking(move || {
            collect_reference_images(&characters, previous.as_deref(), &reducer)
        })
        .await
        .map_err(|e| ExecutorError::Failed(format!("reference image preparation failed: {}", e)))
    }

    async fn render(
        &self,
        ctx: &ExecutorContext,
        config: &VendorConfig,
        settings: &PageSettings,
        page: &Page<'_>,
    ) -> Result<RenderedPage, ExecutorError> {
        let prompt = self.prompt(settings, page);
        let references = self
            .references(&settings.characters, page.previous_image)
            .await?;

        debug!(
            scene_index = page.scene_index,
            references = references.len(),
            prompt_chars = prompt.chars().count(),
            "Rendering page"
        );

        let image = ImageClient::new(&ctx.client, config)?
            .generate(
                &ImageJob {
                    prompt: &prompt,
                    image_size: &settings.image_size,
                    aspect_ratio: &settings.image_aspect_ratio,
                    reference_images: &references,
                },
                &ctx.cancel,
            )
            .await?;

        info!(
            scene_index = page.scene_index,
            rule = image.rule,
            data_uri = image.is_data_uri(),
            "Page image extracted"
        );

        Ok(RenderedPage {
            image_url: image.uri,
            prompt,
        })
    }
}

/// Generates one page image. Result: `{imageUrl, prompt}`.
pub struct SingleImageExecutor {
    pipeline: Arc<ImagePipeline>,
}

impl SingleImageExecutor {
    pub(crate) fn new(pipeline: Arc<ImagePipeline>) -> Self {
        Self { pipeline }
    }
}

impl SinglePayload {
    fn check(&self) -> Result<&VendorConfig, ExecutorError> {
        if self.scene_description.trim().is_empty() {
            return Err(ExecutorError::InvalidPayload(
                "sceneDescription is required".to_string(),
            ));
        }
        require_config(self.settings.image_api_config.as_ref(), "imageApiConfig")
    }
}

#[async_trait]
impl TaskExecutor for SingleImageExecutor {
    fn validate(&self, payload: &Value) -> Result<(), ExecutorError> {
        parse_payload::<SinglePayload>(payload)?.check().map(|_| ())
    }

    async fn execute(&self, task: &Task, ctx: &ExecutorContext) -> Result<Value, ExecutorError> {
        let payload: SinglePayload = parse_payload(&task.payload)?;
        ctx.report(10, "Preparing image").await?;
        let config = payload.check()?;

        let page = Page {
            scene_description: &payload.scene_description,
            story_text: &payload.story_text,
            scene_index: payload.scene_index,
            total_scenes: payload.settings.total_scenes.unwrap_or(1),
            is_character_generation: payload.is_character_generation,
            previous_image: previous_page(payload.scene_index, &payload.settings.previous_image_url),
        };

        ctx.report(30, "Calling image model").await?;
        let rendered = self
            .pipeline
            .render(ctx, config, &payload.settings, &page)
            .await?;

        ctx.report(100, "Image ready").await?;
        Ok(json!({
            "imageUrl": rendered.image_url,
            "prompt": rendered.prompt,
        }))
    }
}

/// Generates every scene in order, feeding each page to the next for
/// continuity. Result: `{images: [{sceneIndex, imageUrl}]}`.
pub struct BatchImageExecutor {
    pipeline: Arc<ImagePipeline>,
}

impl BatchImageExecutor {
    pub(crate) fn new(pipeline: Arc<ImagePipeline>) -> Self {
        Self { pipeline }
    }
}

impl BatchPayload {
    fn check(&self) -> Result<&VendorConfig, ExecutorError> {
        if self.scenes.is_empty() {
            return Err(ExecutorError::InvalidPayload(
                "at least one scene is required".to_string(),
            ));
        }
        if let Some(position) = self
            .scenes
            .iter()
            .position(|s| s.scene_description.trim().is_empty())
        {
            return Err(ExecutorError::InvalidPayload(format!(
                "scene {} has no sceneDescription",
                position + 1
            )));
        }
        require_config(self.settings.image_api_config.as_ref(), "imageApiConfig")
    }
}

#[async_trait]
impl TaskExecutor for BatchImageExecutor {
    fn validate(&self, payload: &Value) -> Result<(), ExecutorError> {
        parse_payload::<BatchPayload>(payload)?.check().map(|_| ())
    }

    async fn execute(&self, task: &Task, ctx: &ExecutorContext) -> Result<Value, ExecutorError> {
        let payload: BatchPayload = parse_payload(&task.payload)?;
        ctx.report(5, "Preparing images").await?;
        let config = payload.check()?;

        let count = payload.scenes.len();
        let total_scenes = payload.settings.total_scenes.unwrap_or(count as u32);
        let mut previous = payload.settings.previous_image_url.clone();
        let mut images = Vec::with_capacity(count);

        for (position, scene) in payload.scenes.iter().enumerate() {
            let scene_index = position as u32 + 1;
            let progress = 5 + (90 * position / count) as u8;
            ctx.report(progress, format!("Generating scene {}/{}", scene_index, count))
                .await?;

            let page = Page {
                scene_description: &scene.scene_description,
                story_text: &scene.story_text,
                scene_index,
                total_scenes,
                is_character_generation: false,
                previous_image: previous_page(scene_index, &previous),
            };
            let rendered = self
                .pipeline
                .render(ctx, config, &payload.settings, &page)
                .await?;

            images.push(json!({
                "sceneIndex": scene_index,
                "imageUrl": rendered.image_url,
            }));
            previous = rendered.image_url;
        }

        ctx.report(100, format!("{} images ready", count)).await?;
        Ok(json!({ "images": images }))
    }
}
