//! Local image storage under `characters/` and `images/`.
//!
//! Every write goes to a freshly generated `<prefix>_<uuid>.<ext>` name opened
//! with `create_new`, so an existing file is never replaced.
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AppResult;
use crate::gemini::types::Blob;

pub const CHARACTER_DIR: &str = "characters";
pub const STORY_IMAGE_DIR: &str = "images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Character,
    Story,
}

impl ImageKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Character => CHARACTER_DIR,
            ImageKind::Story => STORY_IMAGE_DIR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ImageStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ImageKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Writes `bytes` to a new file and returns its path.
    pub async fn save(&self, kind: ImageKind, prefix: &str, bytes: &[u8], mime_type: &str) -> AppResult<PathBuf> {
        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}_{}.{}", prefix, Uuid::new_v4().simple(), extension_for_mime(mime_type)));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Decodes a base64 inline payload and saves it.
    pub async fn save_inline(&self, kind: ImageKind, prefix: &str, blob: &Blob) -> AppResult<PathBuf> {
        let bytes = STANDARD.decode(blob.data.trim())?;
        self.save(kind, prefix, &bytes, &blob.mime_type).await
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

/// Reads a local image as an inline payload.
pub async fn read_inline(path: &Path) -> AppResult<Blob> {
    let bytes = tokio::fs::read(path).await?;
    Ok(Blob { mime_type: mime_for_path(path).to_string(), data: STANDARD.encode(bytes) })
}
