//! Per-session story state and the operations that mutate it.
//!
//! A `Session` is passed by reference into each handler; it holds everything
//! the user has built so far (config, story text, characters, pages).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Character, ImageOutcome, Page, StoryConfig, StoryDraft, MAX_CHARACTERS};
use crate::story::StoryEngine;
use crate::utils::archive::{build_archive, DownloadSelection};
use crate::utils::image_store::{ImageKind, ImageStore};
use crate::utils::poller::CancelToken;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub config: StoryConfig,
    #[serde(skip)]
    api_key: Option<String>,
    pub story: String,
    pub book_name: Option<String>,
    pub characters: Vec<Character>,
    pub pages: Vec<Page>,
}

impl Session {
    pub fn new() -> Self {
        Session { id: Uuid::new_v4(), ..Session::default() }
    }

    pub fn with_config(config: StoryConfig) -> Self {
        Session { config, ..Session::new() }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Blank keys clear the session override.
    pub fn set_api_key(&mut self, key: &str) {
        let key = key.trim();
        self.api_key = (!key.is_empty()).then(|| key.to_string());
    }

    pub fn set_config(&mut self, config: StoryConfig) -> AppResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_story(&mut self, story: impl Into<String>) {
        self.story = story.into();
    }

    /// Generates the story text and replaces the characters with the suggestions.
    pub async fn generate_story(&mut self, engine: &StoryEngine) -> StoryDraft {
        let draft = engine.generate_story(&self.config).await;
        self.story = draft.story.clone();
        self.characters = draft.characters();
        draft
    }

    fn character_mut(&mut self, index: usize) -> AppResult<&mut Character> {
        self.characters
            .get_mut(index)
            .ok_or(AppError::InvalidIndex { kind: "character", index })
    }

    fn page_mut(&mut self, index: usize) -> AppResult<&mut Page> {
        self.pages.get_mut(index).ok_or(AppError::InvalidIndex { kind: "page", index })
    }

    /// Sets name and traits of the character at `index`; `index == len` appends.
    pub fn set_character(&mut self, index: usize, name: &str, traits: &str) -> AppResult<&Character> {
        if index == self.characters.len() {
            if index >= MAX_CHARACTERS {
                return Err(AppError::TooManyCharacters(MAX_CHARACTERS));
            }
            self.characters.push(Character::default());
        }
        let character = self.character_mut(index)?;
        character.name = name.to_string();
        character.traits = traits.to_string();
        Ok(&*character)
    }

    /// Appends a character and returns its index.
    pub fn add_character(&mut self, name: &str, traits: &str) -> AppResult<usize> {
        let index = self.characters.len();
        self.set_character(index, name, traits)?;
        Ok(index)
    }

    /// Keeps only the first `count` characters, padding with empty ones.
    pub fn resize_characters(&mut self, count: usize) -> AppResult<()> {
        if count > MAX_CHARACTERS {
            return Err(AppError::TooManyCharacters(MAX_CHARACTERS));
        }
        self.characters.resize_with(count, Character::default);
        Ok(())
    }

    pub fn clear_characters(&mut self) {
        self.characters.clear();
    }

    /// Stores an uploaded picture as the character's image.
    pub async fn upload_character_image(
        &mut self,
        store: &ImageStore,
        index: usize,
        bytes: &[u8],
        mime_type: &str,
    ) -> AppResult<PathBuf> {
        self.character_mut(index)?;
        let mime_type = mime_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AppError::UnsupportedImageType(mime_type));
        }
        let path = store.save(ImageKind::Character, &format!("character_{}", index + 1), bytes, &mime_type).await?;
        self.character_mut(index)?.image = Some(path.clone());
        Ok(path)
    }

    pub async fn generate_character_image(&mut self, engine: &StoryEngine, index: usize) -> AppResult<ImageOutcome> {
        let character = self.character_mut(index)?.clone();
        let outcome = engine.generate_character_image(&character, &self.config).await?;
        if let Some(path) = outcome.path() {
            self.character_mut(index)?.image = Some(path);
        }
        Ok(outcome)
    }

    /// Redesigns the character from its current picture.
    pub async fn edit_character_image(&mut self, engine: &StoryEngine, index: usize) -> AppResult<ImageOutcome> {
        let character = self.character_mut(index)?.clone();
        let source = character
            .image
            .clone()
            .ok_or_else(|| AppError::MissingSourceImage(format!("character {}", index + 1)))?;
        let outcome = engine.edit_character_image(&character, &source, &self.config).await?;
        if let Some(path) = outcome.path() {
            self.character_mut(index)?.image = Some(path);
        }
        Ok(outcome)
    }

    fn check_ready_to_illustrate(&self) -> AppResult<()> {
        if self.config.title.trim().is_empty() {
            return Err(AppError::MissingTitle);
        }
        if self.story.trim().is_empty() {
            return Err(AppError::MissingStory);
        }
        if !self.characters.iter().all(Character::is_complete) {
            return Err(AppError::IncompleteCharacters);
        }
        Ok(())
    }

    /// Breaks the story into pages and illustrates them in one batch.
    pub async fn illustrate(&mut self, engine: &StoryEngine, cancel: &CancelToken) -> AppResult<Vec<ImageOutcome>> {
        self.check_ready_to_illustrate()?;
        let book = engine.generate_pages(&self.config, &self.characters, &self.story).await;
        self.book_name = Some(book.book_name.clone());
        self.pages = book.into_pages();

        let prompts: Vec<String> = self.pages.iter().map(|p| p.image_prompt.clone()).collect();
        let outcomes = engine.illustrate_pages(&prompts, &self.characters, self.config.ratio, cancel).await;
        for (page, outcome) in self.pages.iter_mut().zip(&outcomes) {
            page.image = outcome.path();
        }
        Ok(outcomes)
    }

    pub fn set_page_prompt(&mut self, index: usize, prompt: &str) -> AppResult<()> {
        self.page_mut(index)?.image_prompt = prompt.to_string();
        Ok(())
    }

    pub async fn regenerate_page(&mut self, engine: &StoryEngine, index: usize) -> AppResult<ImageOutcome> {
        let prompt = self.page_mut(index)?.image_prompt.clone();
        let outcome = engine.regenerate_page_image(&prompt, &self.characters, self.config.ratio).await;
        if let Some(path) = outcome.path() {
            self.page_mut(index)?.image = Some(path);
        }
        Ok(outcome)
    }

    /// Regenerates the page image using its current picture as the base.
    pub async fn edit_page(&mut self, engine: &StoryEngine, index: usize) -> AppResult<ImageOutcome> {
        let page = self.page_mut(index)?.clone();
        let source = page
            .image
            .ok_or_else(|| AppError::MissingSourceImage(format!("page {}", index + 1)))?;
        let outcome = engine
            .edit_page_image(&page.image_prompt, &source, &self.characters, self.config.ratio)
            .await?;
        if let Some(path) = outcome.path() {
            self.page_mut(index)?.image = Some(path);
        }
        Ok(outcome)
    }

    pub async fn archive(&self, selection: DownloadSelection) -> AppResult<Vec<u8>> {
        build_archive(&self.pages, &self.characters, selection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characters_are_capped() {
        let mut s = Session::new();
        for i in 0..MAX_CHARACTERS {
            s.set_character(i, &format!("c{}", i), "t").unwrap();
        }
        assert!(matches!(s.set_character(MAX_CHARACTERS, "x", "y"), Err(AppError::TooManyCharacters(5))));
        assert!(matches!(s.set_character(7, "x", "y"), Err(AppError::InvalidIndex { .. })));
        s.set_character(0, "Mira", "brave").unwrap();
        assert_eq!(s.characters[0].name, "Mira");
        assert!(s.add_character("x", "y").is_err());
        assert!(s.resize_characters(6).is_err());
        s.resize_characters(2).unwrap();
        assert_eq!(s.characters.len(), 2);
    }

    #[test]
    fn illustration_preconditions() {
        let mut s = Session::new();
        assert!(matches!(s.check_ready_to_illustrate(), Err(AppError::MissingTitle)));
        s.config.title = "T".into();
        assert!(matches!(s.check_ready_to_illustrate(), Err(AppError::MissingStory)));
        s.set_story("Once.");
        s.set_character(0, "Mira", "brave").unwrap();
        assert!(matches!(s.check_ready_to_illustrate(), Err(AppError::IncompleteCharacters)));
        s.clear_characters();
        assert!(s.check_ready_to_illustrate().is_ok());
    }

    #[test]
    fn blank_api_key_clears_override() {
        let mut s = Session::new();
        s.set_api_key("  abc ");
        assert_eq!(s.api_key(), Some("abc"));
        s.set_api_key("");
        assert_eq!(s.api_key(), None);
        assert!(!serde_json::to_string(&s).unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn upload_sets_character_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let mut s = Session::new();
        s.set_character(0, "Mira", "brave").unwrap();
        let path = s.upload_character_image(&store, 0, b"img", "image/jpeg").await.unwrap();
        assert_eq!(s.characters[0].image.as_ref(), Some(&path));
        assert!(s.upload_character_image(&store, 3, b"img", "image/jpeg").await.is_err());

        let path = s.upload_character_image(&store, 0, b"img", "Image/PNG; q=1").await.unwrap();
        assert_eq!(path.extension().unwrap(), "png");
    }

    #[tokio::test]
    async fn upload_rejects_non_images_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let mut s = Session::new();
        s.set_character(0, "Mira", "brave").unwrap();
        for mime in ["text/html", "application/octet-stream", ""] {
            let err = s.upload_character_image(&store, 0, b"<html>", mime).await.unwrap_err();
            assert!(matches!(err, AppError::UnsupportedImageType(_)));
            assert!(err.is_precondition());
        }
        assert!(s.characters[0].image.is_none());
        assert!(!store.dir(ImageKind::Character).exists());
    }
}
