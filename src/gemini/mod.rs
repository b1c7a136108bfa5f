//! Gemini text, image, file and batch endpoints behind one trait.
use std::path::Path;

use async_trait::async_trait;

use crate::error::AppResult;

pub mod client;
pub mod types;

pub use client::GeminiClient;
pub use types::{BatchStatus, GenerateContentRequest, GenerateContentResponse, UploadedFile};

/// Remote generation service used by the story engine.
///
/// [`GeminiClient`] talks to the real API; tests substitute an in-memory mock.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> AppResult<GenerateContentResponse>;

    async fn upload_file(&self, path: &Path) -> AppResult<UploadedFile>;

    /// Submits the requests as one batch job and returns the job name.
    async fn create_batch(&self, model: &str, display_name: &str, requests: &[GenerateContentRequest]) -> AppResult<String>;

    async fn get_batch(&self, name: &str) -> AppResult<BatchStatus>;
}
