//! Thin HTTP client for the Gemini REST endpoints.
//!
//! - `generate_content` posts to `models/<model>:generateContent`.
//! - `upload_file` pushes a local file through the resumable Files API.
//! - `create_batch` posts inline requests to `models/<model>:batchGenerateContent`.
//! - `get_batch` fetches `batches/<id>` and reads its state and inline responses.
use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::gemini::types::{batch_key, BatchStatus, GenerateContentRequest, GenerateContentResponse, UploadedFile};
use crate::gemini::GenerativeBackend;
use crate::utils::image_store::mime_for_path;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        GeminiClient { client: Client::new(), base_url: base, api_key }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn check(response: Response, what: &str) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
        tracing::error!("{} failed. Status: {}, Body: {}", what, status, body);
        Err(AppError::Api { status: status.as_u16(), body })
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> AppResult<GenerateContentResponse> {
        let url = self.model_url(model, "generateContent");
        tracing::debug!("Sending generateContent request to {}", url);
        let response = self.client.post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let response = Self::check(response, "generateContent").await?;
        response.json().await.map_err(AppError::HttpClient)
    }

    async fn upload_file(&self, path: &Path) -> AppResult<UploadedFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_for_path(path);
        let display_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        let start = self.client.post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({"file": {"display_name": display_name}}))
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let start = Self::check(start, "file upload start").await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::UnexpectedResponse("upload start returned no x-goog-upload-url".to_string()))?;

        let finish = self.client.post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let finish = Self::check(finish, "file upload").await?;
        let body: Value = finish.json().await.map_err(AppError::HttpClient)?;
        let file = body.get("file").cloned().unwrap_or(body);
        let uploaded: UploadedFile = serde_json::from_value(file)?;
        tracing::info!("Uploaded {} as {}", path.display(), uploaded.uri);
        Ok(uploaded)
    }

    async fn create_batch(&self, model: &str, display_name: &str, requests: &[GenerateContentRequest]) -> AppResult<String> {
        let url = self.model_url(model, "batchGenerateContent");
        let inlined: Vec<Value> = requests
            .iter()
            .enumerate()
            .map(|(i, request)| json!({"request": request, "metadata": {"key": batch_key(i)}}))
            .collect();
        let body = json!({
            "batch": {
                "displayName": display_name,
                "inputConfig": {"requests": {"requests": inlined}}
            }
        });
        tracing::info!("Submitting batch '{}' with {} requests", display_name, requests.len());
        let response = self.client.post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let response = Self::check(response, "batchGenerateContent").await?;
        let op: Value = response.json().await.map_err(AppError::HttpClient)?;
        op.get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::UnexpectedResponse("batch creation returned no job name".to_string()))
    }

    async fn get_batch(&self, name: &str) -> AppResult<BatchStatus> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let response = self.client.get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let response = Self::check(response, "batches.get").await?;
        let op: Value = response.json().await.map_err(AppError::HttpClient)?;
        BatchStatus::from_operation(&op)
    }
}
