//! Shared helpers for integration tests.
#![allow(dead_code)]

pub mod mock_gemini;

use std::sync::Arc;
use std::time::Duration;

use storybook_forge::config::PollSettings;
use storybook_forge::utils::image_store::ImageStore;
use storybook_forge::StoryEngine;

pub use mock_gemini::{MockGemini, MockImage, MockText};

/// Poll settings fast enough for tests.
pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        backoff: 2.0,
        timeout: Duration::from_secs(5),
    }
}

pub fn engine(mock: Arc<MockGemini>, dir: &std::path::Path) -> StoryEngine {
    StoryEngine::new(mock, ImageStore::new(dir)).with_poll_settings(fast_poll())
}
