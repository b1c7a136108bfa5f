//! Shared state and router setup for the HTTP API.
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::api::handlers;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::gemini::{GeminiClient, GenerativeBackend};
use crate::session::Session;
use crate::story::StoryEngine;
use crate::utils::image_store::ImageStore;
use crate::utils::poller::{CancelHandle, CancelToken};

/// Builds a backend for an API key.
pub type BackendFactory = Arc<dyn Fn(&str) -> Arc<dyn GenerativeBackend> + Send + Sync>;

pub struct AppState {
    pub config: Config,
    pub store: ImageStore,
    pub sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
    /// Cancellation handles of running illustration jobs, by session.
    jobs: StdMutex<HashMap<Uuid, CancelHandle>>,
    backend_factory: BackendFactory,
}

impl AppState {
    pub fn new(config: Config, backend_factory: BackendFactory) -> Self {
        AppState {
            store: ImageStore::new(config.output_dir.clone()),
            config,
            sessions: RwLock::new(HashMap::new()),
            jobs: StdMutex::new(HashMap::new()),
            backend_factory,
        }
    }

    /// State backed by the real Gemini API.
    pub fn gemini(config: Config) -> Self {
        let base_url = config.base_url.clone();
        let factory: BackendFactory =
            Arc::new(move |key: &str| Arc::new(GeminiClient::new(base_url.clone(), key.to_string())) as Arc<dyn GenerativeBackend>);
        AppState::new(config, factory)
    }

    pub async fn insert_session(&self, session: Session) -> Uuid {
        let id = session.id;
        self.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn session(&self, id: Uuid) -> AppResult<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned().ok_or(AppError::SessionNotFound(id))
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<Uuid, CancelHandle>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a running illustration job for `id`. The entry is removed
    /// when the returned guard drops, even if the request is abandoned.
    pub fn register_job(&self, id: Uuid) -> (JobGuard<'_>, CancelToken) {
        let (handle, token) = CancelHandle::pair();
        self.jobs().insert(id, handle);
        (JobGuard { state: self, id }, token)
    }

    /// Cancels the running job of `id`; false if none is running.
    pub fn cancel_job(&self, id: Uuid) -> bool {
        match self.jobs().get(&id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_job(&self, id: Uuid) -> bool {
        self.jobs().contains_key(&id)
    }

    /// Engine for a session: its own key if set, else the configured one.
    pub fn engine_for(&self, session: &Session) -> AppResult<StoryEngine> {
        let key = session
            .api_key()
            .or(self.config.api_key.as_deref())
            .ok_or(AppError::MissingApiKey)?;
        Ok(StoryEngine::from_config((self.backend_factory)(key), &self.config))
    }
}

/// Keeps a job registered for as long as it lives.
pub struct JobGuard<'a> {
    state: &'a AppState,
    id: Uuid,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.state.jobs().remove(&self.id);
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:id", get(handlers::get_session))
        .route("/sessions/:id/config", put(handlers::put_config))
        .route("/sessions/:id/api_key", put(handlers::put_api_key))
        .route("/sessions/:id/story", post(handlers::generate_story))
        .route("/sessions/:id/story_text", put(handlers::put_story_text))
        .route("/sessions/:id/characters", delete(handlers::clear_characters))
        .route("/sessions/:id/characters/:index", put(handlers::put_character))
        .route("/sessions/:id/characters/:index/image", post(handlers::upload_character_image))
        .route("/sessions/:id/characters/:index/generate", post(handlers::generate_character))
        .route("/sessions/:id/characters/:index/edit", post(handlers::edit_character))
        .route("/sessions/:id/illustrate", post(handlers::illustrate).delete(handlers::cancel_illustration))
        .route("/sessions/:id/pages/:index/prompt", put(handlers::put_page_prompt))
        .route("/sessions/:id/pages/:index/regenerate", post(handlers::regenerate_page))
        .route("/sessions/:id/pages/:index/edit", post(handlers::edit_page))
        .route("/sessions/:id/download", get(handlers::download))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
