//! Storybook Forge library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the server binary.
//! - `gemini`: Thin client for the Gemini text, image, file and batch endpoints.
//! - `prompt`: Prompt construction for stories, pages and characters.
//! - `story`: Structured text generation, batch illustration and single-shot regeneration.
//! - `session`: Per-session story state passed into each handler.
//! - `utils`: Image storage, ZIP packaging and the batch poller.
//! - `model`: Story, character and page records.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `GeminiClient`,
//! `PromptConstructor`, `StoryEngine` and `Session`.
pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod model;
pub mod prompt;
pub mod session;
pub mod story;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use gemini::{GeminiClient, GenerativeBackend};
pub use prompt::constructor::PromptConstructor;
pub use session::Session;
pub use story::StoryEngine;
