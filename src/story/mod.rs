//! Story generation: structured text requests and image requests against a
//! [`GenerativeBackend`], with results written through an [`ImageStore`].
use std::sync::Arc;

use crate::config::{Config, PollSettings, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::gemini::GenerativeBackend;
use crate::prompt::constructor::PromptConstructor;
use crate::utils::image_store::ImageStore;
use crate::utils::poller::Poller;

pub mod images;
pub mod text;

pub use text::{fallback_storybook, fallback_story_draft};

#[derive(Clone)]
pub struct StoryEngine {
    backend: Arc<dyn GenerativeBackend>,
    store: ImageStore,
    prompts: PromptConstructor,
    poller: Poller,
    text_model: String,
    image_model: String,
}

impl StoryEngine {
    pub fn new(backend: Arc<dyn GenerativeBackend>, store: ImageStore) -> Self {
        StoryEngine {
            backend,
            store,
            prompts: PromptConstructor::new(),
            poller: Poller::new(PollSettings::default()),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Engine using the models, output directory and poll cadence from `config`.
    pub fn from_config(backend: Arc<dyn GenerativeBackend>, config: &Config) -> Self {
        StoryEngine::new(backend, ImageStore::new(config.output_dir.clone()))
            .with_models(config.text_model.clone(), config.image_model.clone())
            .with_poll_settings(config.poll)
    }

    pub fn with_models(mut self, text_model: String, image_model: String) -> Self {
        self.text_model = text_model;
        self.image_model = image_model;
        self
    }

    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.poller = Poller::new(settings);
        self
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn prompts(&self) -> &PromptConstructor {
        &self.prompts
    }
}
