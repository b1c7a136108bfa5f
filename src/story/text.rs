//! Structured text generation: story drafts and page breakdowns.
//!
//! Any failure of the remote call (transport, status, missing text, JSON that
//! does not match the schema) is logged and replaced by a fixed fallback, so
//! callers always receive a usable value.
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::gemini::types::{Content, GenerateContentRequest, GenerationConfig, Part};
use crate::model::{Character, CharacterSketch, PageSketch, StoryConfig, StoryDraft, Storybook, MAX_CHARACTERS};
use crate::story::StoryEngine;

pub fn story_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "story": {"type": "STRING", "description": "The story of the book"},
            "character": {
                "type": "ARRAY",
                "description": "List of characters",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": {"type": "STRING", "description": "Name of the character"},
                        "trait": {"type": "STRING", "description": "Trait of the character"}
                    },
                    "required": ["name", "trait"]
                }
            }
        },
        "required": ["story", "character"]
    })
}

pub fn storybook_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "book_name": {"type": "STRING", "description": "Name of the storybook"},
            "pages": {
                "type": "ARRAY",
                "description": "List of pages in the storybook",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": {"type": "STRING", "description": "The text of the page"},
                        "image_prompt": {"type": "STRING", "description": "The image prompt for the illustration"}
                    },
                    "required": ["text", "image_prompt"]
                }
            }
        },
        "required": ["book_name", "pages"]
    })
}

pub fn fallback_story_draft() -> StoryDraft {
    StoryDraft {
        story: "Once upon a time...".to_string(),
        character: vec![CharacterSketch {
            name: "Jane Doe".to_string(),
            trait_: "A lion, brave, black color, tall".to_string(),
        }],
    }
}

pub fn fallback_storybook() -> Storybook {
    Storybook {
        book_name: "a lost banana".to_string(),
        pages: vec![PageSketch {
            text: "Once upon a time...".to_string(),
            image_prompt: "A watercolor painting of a banana in a forest.".to_string(),
        }],
    }
}

pub fn structured_request(prompt: String, schema: Value) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            ..GenerationConfig::default()
        }),
    }
}

impl StoryEngine {
    async fn request_structured<T: DeserializeOwned>(&self, prompt: String, schema: Value) -> AppResult<T> {
        let request = structured_request(prompt, schema);
        let response = self.backend.generate_content(&self.text_model, &request).await?;
        let text = response
            .first_text()
            .ok_or_else(|| AppError::UnexpectedResponse("structured response carried no text".to_string()))?;
        Ok(serde_json::from_str(text)?)
    }

    /// Story text plus up to five character suggestions.
    pub async fn generate_story(&self, config: &StoryConfig) -> StoryDraft {
        let prompt = self.prompts.story_prompt(config);
        match self.request_structured::<StoryDraft>(prompt, story_schema()).await {
            Ok(mut draft) => {
                draft.character.truncate(MAX_CHARACTERS);
                tracing::info!("Generated story '{}' with {} characters", config.title, draft.character.len());
                draft
            }
            Err(e) => {
                tracing::warn!("Story generation failed, using fallback: {}", e);
                fallback_story_draft()
            }
        }
    }

    /// Splits `story` into pages with image prompts.
    pub async fn generate_pages(&self, config: &StoryConfig, characters: &[Character], story: &str) -> Storybook {
        let prompt = self.prompts.page_prompt(config, characters, story);
        let wanted = config.page_count() as usize;
        match self.request_structured::<Storybook>(prompt, storybook_schema()).await {
            Ok(book) if book.pages.is_empty() => {
                tracing::warn!("Page generation returned no pages, using fallback");
                fallback_storybook()
            }
            Ok(mut book) => {
                if book.pages.len() != wanted {
                    tracing::warn!("Requested {} pages, model returned {}", wanted, book.pages.len());
                    book.pages.truncate(wanted);
                }
                book
            }
            Err(e) => {
                tracing::warn!("Page generation failed, using fallback: {}", e);
                fallback_storybook()
            }
        }
    }
}
