//! Mock Gemini backend for testing.
//!
//! Text requests (those carrying a response schema) answer with the configured
//! [`MockText`]; image requests pop [`MockImage`]s from a queue and fall back
//! to a small PNG payload. Batch jobs walk through a scripted list of states.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use storybook_forge::error::{AppError, AppResult};
use storybook_forge::gemini::types::{
    BatchItem, Blob, Candidate, Content, Part, PromptFeedback, Status,
};
use storybook_forge::gemini::{BatchStatus, GenerateContentRequest, GenerateContentResponse, GenerativeBackend, UploadedFile};
use storybook_forge::model::JobState;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nmock-image";

/// Behavior of text (structured output) requests.
#[derive(Debug, Clone)]
pub enum MockText {
    /// Reply with this text as the first part
    Json(String),
    /// Fail the call
    Error,
}

/// Outcome of one image request.
#[derive(Debug, Clone)]
pub enum MockImage {
    Image(Vec<u8>),
    Blocked(String),
    Finish(String),
    /// Per-item batch error
    ItemError(String),
}

impl MockImage {
    fn into_item(self) -> BatchItem {
        match self {
            MockImage::ItemError(message) => BatchItem {
                response: None,
                error: Some(Status { code: Some(13), message }),
                metadata: None,
            },
            other => BatchItem { response: Some(other.into_response()), error: None, metadata: None },
        }
    }

    fn into_response(self) -> GenerateContentResponse {
        match self {
            MockImage::Image(bytes) => GenerateContentResponse {
                candidates: vec![Candidate {
                    content: Some(Content {
                        role: Some("model".to_string()),
                        parts: vec![
                            Part::text("Here is your picture"),
                            Part::inline(Blob { mime_type: "image/png".to_string(), data: STANDARD.encode(bytes) }),
                        ],
                    }),
                    finish_reason: Some("STOP".to_string()),
                }],
                prompt_feedback: None,
            },
            MockImage::Blocked(reason) => GenerateContentResponse {
                candidates: Vec::new(),
                prompt_feedback: Some(PromptFeedback { block_reason: Some(reason), block_reason_message: None }),
            },
            MockImage::Finish(reason) => GenerateContentResponse {
                candidates: vec![Candidate { content: None, finish_reason: Some(reason) }],
                prompt_feedback: None,
            },
            MockImage::ItemError(message) => GenerateContentResponse {
                candidates: vec![Candidate { content: None, finish_reason: Some(message) }],
                prompt_feedback: None,
            },
        }
    }
}

pub struct MockGemini {
    text: Mutex<MockText>,
    images: Mutex<VecDeque<MockImage>>,
    image_error: Mutex<bool>,
    batch_items: Mutex<Option<Vec<MockImage>>>,
    batch_states: Mutex<VecDeque<JobState>>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<PathBuf>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
    batch_requests: Mutex<Vec<GenerateContentRequest>>,
}

impl MockGemini {
    pub fn new() -> Self {
        MockGemini {
            text: Mutex::new(MockText::Error),
            images: Mutex::new(VecDeque::new()),
            image_error: Mutex::new(false),
            batch_items: Mutex::new(None),
            batch_states: Mutex::new(VecDeque::from([JobState::Succeeded])),
            calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            batch_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(self, text: MockText) -> Self {
        *self.text.lock().unwrap() = text;
        self
    }

    pub fn with_story(self, value: serde_json::Value) -> Self {
        self.with_text(MockText::Json(value.to_string()))
    }

    pub fn with_images(self, images: Vec<MockImage>) -> Self {
        *self.images.lock().unwrap() = images.into();
        self
    }

    /// Single-shot image calls fail at the transport level.
    pub fn with_image_error(self) -> Self {
        *self.image_error.lock().unwrap() = true;
        self
    }

    /// Items returned by a succeeded batch (default: one image per request).
    pub fn with_batch_items(self, items: Vec<MockImage>) -> Self {
        *self.batch_items.lock().unwrap() = Some(items);
        self
    }

    /// States reported by successive `get_batch` calls; the last one repeats.
    pub fn with_batch_states(self, states: Vec<JobState>) -> Self {
        *self.batch_states.lock().unwrap() = states.into();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn batch_requests(&self) -> Vec<GenerateContentRequest> {
        self.batch_requests.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

/// `pages` story pages as the text model would return them.
pub fn storybook_json(pages: usize) -> serde_json::Value {
    json!({
        "book_name": "The Lost Puppy",
        "pages": (1..=pages)
            .map(|i| json!({"text": format!("Page {} text", i), "image_prompt": format!("Scene {}", i)}))
            .collect::<Vec<_>>()
    })
}

#[async_trait]
impl GenerativeBackend for MockGemini {
    async fn generate_content(&self, _model: &str, request: &GenerateContentRequest) -> AppResult<GenerateContentResponse> {
        self.record("generate_content");
        self.requests.lock().unwrap().push(request.clone());

        let is_text = request
            .generation_config
            .as_ref()
            .map(|c| c.response_schema.is_some())
            .unwrap_or(false);
        if is_text {
            return match self.text.lock().unwrap().clone() {
                MockText::Json(text) => Ok(GenerateContentResponse {
                    candidates: vec![Candidate {
                        content: Some(Content { role: Some("model".to_string()), parts: vec![Part::text(text)] }),
                        finish_reason: Some("STOP".to_string()),
                    }],
                    prompt_feedback: None,
                }),
                MockText::Error => Err(AppError::Api { status: 500, body: "mock text failure".to_string() }),
            };
        }

        if *self.image_error.lock().unwrap() {
            return Err(AppError::Api { status: 503, body: "mock image failure".to_string() });
        }
        let next = self.images.lock().unwrap().pop_front().unwrap_or_else(|| MockImage::Image(PNG_BYTES.to_vec()));
        Ok(next.into_response())
    }

    async fn upload_file(&self, path: &Path) -> AppResult<UploadedFile> {
        self.record("upload_file");
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(path.to_path_buf());
        Ok(UploadedFile {
            name: format!("files/{}", uploads.len()),
            uri: format!("https://mock.test/files/{}", uploads.len()),
            mime_type: "image/png".to_string(),
        })
    }

    async fn create_batch(&self, _model: &str, _display_name: &str, requests: &[GenerateContentRequest]) -> AppResult<String> {
        self.record("create_batch");
        self.batch_requests.lock().unwrap().extend_from_slice(requests);
        Ok("batches/mock-1".to_string())
    }

    async fn get_batch(&self, name: &str) -> AppResult<BatchStatus> {
        self.record("get_batch");
        let state = {
            let mut states = self.batch_states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap_or(JobState::Succeeded)
            } else {
                states.front().copied().unwrap_or(JobState::Succeeded)
            }
        };
        let responses = if state == JobState::Succeeded {
            let submitted = self.batch_requests.lock().unwrap().len();
            match self.batch_items.lock().unwrap().clone() {
                Some(items) => items.into_iter().map(MockImage::into_item).collect(),
                None => (0..submitted).map(|_| MockImage::Image(PNG_BYTES.to_vec()).into_item()).collect(),
            }
        } else {
            Vec::new()
        };
        Ok(BatchStatus { name: name.to_string(), state, responses })
    }
}
