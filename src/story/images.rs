//! Illustration requests: one batch for all pages, plus single-shot
//! character and page (re)generation.
//!
//! Request building and response interpretation are shared by every path.
//! Remote failures never escape as errors: they come back as an
//! [`ImageOutcome`] with an empty path and the reason. Only missing inputs,
//! detected before any remote call, are returned as `Err`.
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::gemini::types::{
    Blob, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig, Part, UploadedFile,
};
use crate::model::{AspectRatio, Character, ImageOutcome, JobState, StoryConfig};
use crate::prompt::constructor::{EDIT_CHARACTER_INSTRUCTION, EDIT_PICTURE_INSTRUCTION};
use crate::story::StoryEngine;
use crate::utils::image_store::{read_inline, ImageKind};
use crate::utils::poller::CancelToken;

pub const BATCH_DISPLAY_NAME: &str = "storybook-illustrations";

/// Image to edit, placed ahead of everything else in the request.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub blob: Blob,
    pub instruction: &'static str,
}

/// Builds an image request: source image and instruction (if editing), then
/// the character reference handles, then the prompt text.
pub fn build_image_request(
    source: Option<&SourceImage>,
    references: &[UploadedFile],
    text: String,
    ratio: AspectRatio,
) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(references.len() + 3);
    if let Some(source) = source {
        parts.push(Part::inline(source.blob.clone()));
        parts.push(Part::text(source.instruction));
    }
    parts.extend(references.iter().map(Part::file));
    parts.push(Part::text(text));

    GenerateContentRequest {
        contents: vec![Content::user(parts)],
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
            image_config: Some(ImageConfig { aspect_ratio: ratio.as_str().to_string() }),
            ..GenerationConfig::default()
        }),
    }
}

/// The first inline image of a response, or why there is none.
///
/// A prompt-level block wins, then any finish reason other than `STOP`
/// (including `FINISH_REASON_UNSPECIFIED`).
pub fn interpret_response(response: &GenerateContentResponse) -> Result<&Blob, String> {
    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = feedback.block_reason.as_deref().filter(|r| !r.is_empty()) {
            return Err(match feedback.block_reason_message.as_deref() {
                Some(msg) if !msg.is_empty() => format!("{}: {}", reason, msg),
                _ => reason.to_string(),
            });
        }
    }
    let candidate = response.candidates.first().ok_or_else(|| "NO_CANDIDATES".to_string())?;
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            return Err(reason.to_string());
        }
    }
    response.first_image().ok_or_else(|| "NO_IMAGE".to_string())
}

impl StoryEngine {
    async fn materialize(&self, kind: ImageKind, prefix: &str, response: &GenerateContentResponse) -> ImageOutcome {
        match interpret_response(response) {
            Ok(blob) => match self.store.save_inline(kind, prefix, blob).await {
                Ok(path) => ImageOutcome::saved(path.to_string_lossy()),
                Err(e) => ImageOutcome::failed(e.to_string()),
            },
            Err(reason) => {
                tracing::warn!("Image request for {} produced no image: {}", prefix, reason);
                ImageOutcome::failed(reason)
            }
        }
    }

    /// Uploads each character's reference image once.
    async fn upload_references(&self, characters: &[Character]) -> AppResult<Vec<UploadedFile>> {
        let mut handles = Vec::new();
        for path in characters.iter().filter_map(|c| c.image.as_deref()) {
            handles.push(self.backend.upload_file(path).await?);
        }
        Ok(handles)
    }

    async fn single_shot(&self, kind: ImageKind, prefix: &str, request: AppResult<GenerateContentRequest>) -> ImageOutcome {
        let request = match request {
            Ok(r) => r,
            Err(e) => return ImageOutcome::failed(e.to_string()),
        };
        match self.backend.generate_content(&self.image_model, &request).await {
            Ok(response) => self.materialize(kind, prefix, &response).await,
            Err(e) => {
                tracing::error!("Image request for {} failed: {}", prefix, e);
                ImageOutcome::failed(e.to_string())
            }
        }
    }

    async fn page_request(
        &self,
        source: Option<&SourceImage>,
        prompt: &str,
        characters: &[Character],
        ratio: AspectRatio,
    ) -> AppResult<GenerateContentRequest> {
        let references = self.upload_references(characters).await?;
        let text = self.prompts.decorate_image_prompt(prompt, characters);
        Ok(build_image_request(source, &references, text, ratio))
    }

    /// Illustrates every page in one batch job.
    ///
    /// The result has one entry per prompt, in prompt order. A page that was
    /// blocked or failed keeps its slot with an empty path.
    pub async fn illustrate_pages(
        &self,
        prompts: &[String],
        characters: &[Character],
        ratio: AspectRatio,
        cancel: &CancelToken,
    ) -> Vec<ImageOutcome> {
        if prompts.is_empty() {
            return Vec::new();
        }
        match self.run_batch(prompts, characters, ratio, cancel).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Batch illustration failed: {}", e);
                vec![ImageOutcome::failed(e.to_string()); prompts.len()]
            }
        }
    }

    async fn run_batch(
        &self,
        prompts: &[String],
        characters: &[Character],
        ratio: AspectRatio,
        cancel: &CancelToken,
    ) -> AppResult<Vec<ImageOutcome>> {
        let references = self.upload_references(characters).await?;
        let requests: Vec<GenerateContentRequest> = prompts
            .iter()
            .map(|p| build_image_request(None, &references, self.prompts.decorate_image_prompt(p, characters), ratio))
            .collect();

        let job = self.backend.create_batch(&self.image_model, BATCH_DISPLAY_NAME, &requests).await?;
        let status = self
            .poller
            .wait(self.backend.as_ref(), &job, cancel)
            .await?
            .in_request_order(prompts.len());
        if status.state != JobState::Succeeded {
            return Ok(vec![ImageOutcome::failed(status.state.to_string()); prompts.len()]);
        }

        let mut outcomes = Vec::with_capacity(prompts.len());
        for i in 0..prompts.len() {
            let prefix = format!("page_{}", i + 1);
            let outcome = match status.responses.get(i) {
                Some(item) => match (&item.response, &item.error) {
                    (Some(response), _) => self.materialize(ImageKind::Story, &prefix, response).await,
                    (None, Some(err)) => ImageOutcome::failed(err.message.clone()),
                    (None, None) => ImageOutcome::failed("empty response"),
                },
                None => ImageOutcome::failed("missing response"),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// New page image from a prompt.
    pub async fn regenerate_page_image(&self, prompt: &str, characters: &[Character], ratio: AspectRatio) -> ImageOutcome {
        let request = self.page_request(None, prompt, characters, ratio).await;
        self.single_shot(ImageKind::Story, "page", request).await
    }

    /// Page image edited from an existing one.
    pub async fn edit_page_image(
        &self,
        prompt: &str,
        source: &Path,
        characters: &[Character],
        ratio: AspectRatio,
    ) -> AppResult<ImageOutcome> {
        let source = load_source(source, EDIT_PICTURE_INSTRUCTION).await?;
        let request = self.page_request(Some(&source), prompt, characters, ratio).await;
        Ok(self.single_shot(ImageKind::Story, "page", request).await)
    }

    /// Character portrait from its name and traits.
    pub async fn generate_character_image(&self, character: &Character, config: &StoryConfig) -> AppResult<ImageOutcome> {
        if !character.has_details() {
            return Err(AppError::MissingCharacterDetails);
        }
        let prompt = self.prompts.character_prompt(&character.description(), config);
        let text = self.prompts.decorate_image_prompt(&prompt, &[]);
        let request = build_image_request(None, &[], text, config.ratio);
        Ok(self.single_shot(ImageKind::Character, "character", Ok(request)).await)
    }

    /// Character portrait redesigned from an existing picture.
    pub async fn edit_character_image(
        &self,
        character: &Character,
        source: &Path,
        config: &StoryConfig,
    ) -> AppResult<ImageOutcome> {
        let source = load_source(source, EDIT_CHARACTER_INSTRUCTION).await?;
        let prompt = self.prompts.character_redesign_prompt(&character.description(), config);
        let text = self.prompts.decorate_image_prompt(&prompt, &[]);
        let request = build_image_request(Some(&source), &[], text, config.ratio);
        Ok(self.single_shot(ImageKind::Character, "character_regen", Ok(request)).await)
    }
}

async fn load_source(path: &Path, instruction: &'static str) -> AppResult<SourceImage> {
    if !path.is_file() {
        return Err(AppError::MissingSourceImage(path.display().to_string()));
    }
    Ok(SourceImage { blob: read_inline(path).await?, instruction })
}
