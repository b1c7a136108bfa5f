//! Wire types for the Gemini `generateContent`, batch and file endpoints.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::JobState;

/// Inline bytes, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "inline_data")]
    pub inline_data: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "file_data")]
    pub file_data: Option<FileData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part { text: Some(text.into()), ..Part::default() }
    }

    pub fn inline(blob: Blob) -> Self {
        Part { inline_data: Some(blob), ..Part::default() }
    }

    pub fn file(file: &UploadedFile) -> Self {
        Part {
            file_data: Some(FileData { mime_type: file.mime_type.clone(), file_uri: file.uri.clone() }),
            ..Part::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Content { role: Some("user".to_string()), parts }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }

    /// First non-empty text part of the first candidate.
    pub fn first_text(&self) -> Option<&str> {
        self.parts().filter_map(|p| p.text.as_deref()).find(|t| !t.trim().is_empty())
    }

    pub fn first_image(&self) -> Option<&Blob> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}

/// Handle for a file held by the Files API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default)]
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

/// One entry of a finished batch: a response or a per-request error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub response: Option<GenerateContentResponse>,
    #[serde(default)]
    pub error: Option<Status>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatus {
    pub name: String,
    pub state: JobState,
    pub responses: Vec<BatchItem>,
}

/// Metadata key attached to the request at `index`.
pub fn batch_key(index: usize) -> String {
    format!("request-{}", index + 1)
}

fn key_position(item: &BatchItem) -> Option<usize> {
    let key = item.metadata.as_ref()?.get("key")?.as_str()?;
    key.strip_prefix("request-")?.parse::<usize>().ok()?.checked_sub(1)
}

impl BatchStatus {
    /// Reads a batch operation as returned by `batches.get`.
    ///
    /// The state lives under `metadata.state` (or top-level `state`); inline
    /// responses under `response.inlinedResponses.inlinedResponses` or
    /// `metadata.output.inlinedResponses.inlinedResponses`. Items keep the
    /// order they arrived in; see [`BatchStatus::in_request_order`].
    pub fn from_operation(op: &Value) -> AppResult<Self> {
        let name = op
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::UnexpectedResponse("batch operation without a name".to_string()))?
            .to_string();
        let state = op
            .pointer("/metadata/state")
            .or_else(|| op.get("state"))
            .and_then(|v| v.as_str())
            .map(JobState::from_provider)
            .unwrap_or(JobState::Pending);

        let raw = op
            .pointer("/response/inlinedResponses/inlinedResponses")
            .or_else(|| op.pointer("/metadata/output/inlinedResponses/inlinedResponses"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let responses: Vec<BatchItem> = serde_json::from_value(raw)?;

        Ok(BatchStatus { name, state, responses })
    }

    /// Places each item at the slot named by its `request-N` key, for a batch
    /// of `submitted` requests. A skipped key leaves an empty item behind.
    ///
    /// Items are left in arrival order unless every key is present, unique and
    /// below `submitted`.
    pub fn in_request_order(mut self, submitted: usize) -> Self {
        let positions: Option<Vec<usize>> = self.responses.iter().map(key_position).collect();
        let Some(positions) = positions else {
            return self;
        };
        let mut seen = vec![false; submitted];
        let valid = positions.iter().all(|&pos| match seen.get_mut(pos) {
            Some(taken) if !*taken => {
                *taken = true;
                true
            }
            _ => false,
        });
        if !valid {
            tracing::warn!(
                "Batch {} returned out-of-range or duplicate request keys; keeping arrival order",
                self.name
            );
            return self;
        }
        let mut slots = vec![BatchItem::default(); submitted];
        for (pos, item) in positions.into_iter().zip(self.responses) {
            slots[pos] = item;
        }
        self.responses = slots;
        self
    }
}
