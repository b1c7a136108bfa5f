//! Axum request handlers for the HTTP API.
//!
//! Each handler locks one session for the duration of its remote calls, so a
//! session never sees two writers at once.
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::routes::AppState;
use crate::error::AppResult;
use crate::model::{Character, ImageOutcome, StoryConfig, StoryDraft};
use crate::session::Session;
use crate::utils::archive::DownloadSelection;

pub async fn root() -> &'static str {
    "Storybook Forge API"
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyBody {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct StoryTextBody {
    pub story: String,
}

#[derive(Debug, Deserialize)]
pub struct CharacterBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub traits: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub image_prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub selection: Option<String>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(config): Json<StoryConfig>,
) -> AppResult<Json<Session>> {
    config.validate()?;
    let session = Session::with_config(config);
    let snapshot = session.clone();
    state.insert_session(session).await;
    tracing::info!("Created session {}", snapshot.id);
    Ok(Json(snapshot))
}

pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<Session>> {
    let session = state.session(id).await?;
    let snapshot = session.lock().await.clone();
    Ok(Json(snapshot))
}

pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(config): Json<StoryConfig>,
) -> AppResult<Json<Session>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    session.set_config(config)?;
    Ok(Json(session.clone()))
}

pub async fn put_api_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApiKeyBody>,
) -> AppResult<Json<Value>> {
    let session = state.session(id).await?;
    session.lock().await.set_api_key(&body.api_key);
    Ok(Json(json!({"status": "success"})))
}

pub async fn generate_story(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<StoryDraft>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;
    Ok(Json(session.generate_story(&engine).await))
}

pub async fn put_story_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<StoryTextBody>,
) -> AppResult<Json<Session>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    session.set_story(body.story);
    Ok(Json(session.clone()))
}

pub async fn put_character(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(body): Json<CharacterBody>,
) -> AppResult<Json<Character>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let character = session.set_character(index, &body.name, &body.traits)?.clone();
    Ok(Json(character))
}

pub async fn clear_characters(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<Session>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    session.clear_characters();
    Ok(Json(session.clone()))
}

pub async fn upload_character_image(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let path = session.upload_character_image(&state.store, index, &body, &mime_type).await?;
    Ok(Json(json!({"path": path})))
}

pub async fn generate_character(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<ImageOutcome>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;
    Ok(Json(session.generate_character_image(&engine, index).await?))
}

pub async fn edit_character(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<ImageOutcome>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;
    Ok(Json(session.edit_character_image(&engine, index).await?))
}

pub async fn illustrate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ImageOutcome>>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;

    let (_job, token) = state.register_job(id);
    Ok(Json(session.illustrate(&engine, &token).await?))
}

/// Cancels a running illustration job for the session, if any.
pub async fn cancel_illustration(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<Value>> {
    state.session(id).await?;
    let cancelled = state.cancel_job(id);
    if cancelled {
        tracing::info!("Cancelled illustration for session {}", id);
    }
    Ok(Json(json!({"cancelled": cancelled})))
}

pub async fn put_page_prompt(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(body): Json<PromptBody>,
) -> AppResult<Json<Value>> {
    let session = state.session(id).await?;
    session.lock().await.set_page_prompt(index, &body.image_prompt)?;
    Ok(Json(json!({"status": "success"})))
}

pub async fn regenerate_page(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<ImageOutcome>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;
    Ok(Json(session.regenerate_page(&engine, index).await?))
}

pub async fn edit_page(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<ImageOutcome>> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let engine = state.engine_for(&session)?;
    Ok(Json(session.edit_page(&engine, index).await?))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> AppResult<impl IntoResponse> {
    let selection = match query.selection.as_deref() {
        Some(s) => s.parse::<DownloadSelection>()?,
        None => DownloadSelection::All,
    };
    let session = state.session(id).await?;
    let bytes = session.lock().await.archive(selection).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"storybook_assets.zip\""),
        ],
        bytes,
    ))
}
