//! ZIP packaging of story and character images for download.
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::model::{Character, Page};

pub const STORY_IMAGES_FOLDER: &str = "story_images";
pub const CHARACTERS_FOLDER: &str = "characters";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadSelection {
    #[default]
    All,
    #[serde(alias = "story_images")]
    Story,
    Characters,
}

impl DownloadSelection {
    fn includes_story(&self) -> bool {
        matches!(self, DownloadSelection::All | DownloadSelection::Story)
    }

    fn includes_characters(&self) -> bool {
        matches!(self, DownloadSelection::All | DownloadSelection::Characters)
    }
}

impl FromStr for DownloadSelection {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DownloadSelection::All),
            "story" | "story_images" => Ok(DownloadSelection::Story),
            "characters" | "character" => Ok(DownloadSelection::Characters),
            other => Err(AppError::Config(format!("Unknown download selection '{}'", other))),
        }
    }
}

/// Entry name `<folder>/<position><.ext>`, position counted from 1.
fn entry_name(folder: &str, position: usize, path: &Path) -> String {
    let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    format!("{}/{}{}", folder, position, ext)
}

/// Builds the download archive. Slots without an image, or whose file is gone,
/// are skipped but keep their position number for the ones that follow.
///
/// Files are read asynchronously; compression runs on the blocking pool.
pub async fn build_archive(pages: &[Page], characters: &[Character], selection: DownloadSelection) -> AppResult<Vec<u8>> {
    let mut entries = Vec::new();
    if selection.includes_story() {
        for (i, page) in pages.iter().enumerate() {
            if let Some(path) = &page.image {
                if let Some(bytes) = read_entry(path).await? {
                    entries.push((entry_name(STORY_IMAGES_FOLDER, i + 1, path), bytes));
                }
            }
        }
    }
    if selection.includes_characters() {
        for (i, character) in characters.iter().enumerate() {
            if let Some(path) = &character.image {
                if let Some(bytes) = read_entry(path).await? {
                    entries.push((entry_name(CHARACTERS_FOLDER, i + 1, path), bytes));
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || write_zip(entries))
        .await
        .map_err(|e| AppError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

async fn read_entry(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!("Skipping missing image {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}
