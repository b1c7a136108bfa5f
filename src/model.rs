//! Story, character and page records shared by the service and the CLI.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Most characters a single story may carry.
pub const MAX_CHARACTERS: usize = 5;
pub const MAX_PAGES: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Classic,
        AspectRatio::ClassicPortrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Classic => "4:3",
            AspectRatio::ClassicPortrait => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| AppError::InvalidAspectRatio(s.to_string()))
    }
}

/// User-supplied parameters for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub title: String,
    pub genre: String,
    pub tone: String,
    pub art_style: String,
    pub age: String,
    pub pages: u32,
    pub ratio: AspectRatio,
}

impl Default for StoryConfig {
    fn default() -> Self {
        StoryConfig {
            title: String::new(),
            genre: "Children".to_string(),
            tone: "Heartwarming".to_string(),
            art_style: "Watercolor illustration, soft colors".to_string(),
            age: String::new(),
            pages: 10,
            ratio: AspectRatio::Square,
        }
    }
}

impl StoryConfig {
    /// Rejects page counts outside 1..=MAX_PAGES.
    pub fn validate(&self) -> AppResult<()> {
        if (1..=MAX_PAGES).contains(&self.pages) {
            Ok(())
        } else {
            Err(AppError::InvalidPageCount(self.pages))
        }
    }

    /// Page count clamped into the supported range.
    pub fn page_count(&self) -> u32 {
        self.pages.clamp(1, MAX_PAGES)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub traits: String,
    pub image: Option<PathBuf>,
}

impl Character {
    pub fn new(name: impl Into<String>, traits: impl Into<String>) -> Self {
        Character { name: name.into(), traits: traits.into(), image: None }
    }

    pub fn has_details(&self) -> bool {
        !self.name.is_empty() || !self.traits.is_empty()
    }

    /// Name, traits and image are all filled in.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.traits.is_empty() && self.image.is_some()
    }

    /// "name, traits" as used by the character prompts.
    pub fn description(&self) -> String {
        format!("{}, {}", self.name, self.traits)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub text: String,
    pub image_prompt: String,
    #[serde(default)]
    pub image: Option<PathBuf>,
}

/// Character suggestion as returned by the text model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSketch {
    pub name: String,
    #[serde(rename = "trait")]
    pub trait_: String,
}

/// Structured output of the story request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDraft {
    pub story: String,
    pub character: Vec<CharacterSketch>,
}

impl StoryDraft {
    /// Suggestions as editable characters, capped at [`MAX_CHARACTERS`].
    pub fn characters(&self) -> Vec<Character> {
        self.character
            .iter()
            .take(MAX_CHARACTERS)
            .map(|c| Character::new(c.name.clone(), c.trait_.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSketch {
    pub text: String,
    pub image_prompt: String,
}

/// Structured output of the page-prompt request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storybook {
    pub book_name: String,
    pub pages: Vec<PageSketch>,
}

impl Storybook {
    pub fn into_pages(self) -> Vec<Page> {
        self.pages
            .into_iter()
            .map(|p| Page { text: p.text, image_prompt: p.image_prompt, image: None })
            .collect()
    }
}

/// Provider-side batch job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
}

impl JobState {
    /// Accepts both `JOB_STATE_*` and `BATCH_STATE_*` spellings.
    pub fn from_provider(raw: &str) -> Self {
        let name = raw
            .trim()
            .trim_start_matches("JOB_STATE_")
            .trim_start_matches("BATCH_STATE_");
        match name {
            "RUNNING" => JobState::Running,
            "SUCCEEDED" => JobState::Succeeded,
            "FAILED" => JobState::Failed,
            "CANCELLED" => JobState::Cancelled,
            "EXPIRED" => JobState::Expired,
            _ => JobState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled | JobState::Expired)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "JOB_STATE_PENDING",
            JobState::Running => "JOB_STATE_RUNNING",
            JobState::Succeeded => "JOB_STATE_SUCCEEDED",
            JobState::Failed => "JOB_STATE_FAILED",
            JobState::Cancelled => "JOB_STATE_CANCELLED",
            JobState::Expired => "JOB_STATE_EXPIRED",
        };
        f.write_str(s)
    }
}

/// Result of one image request: `path` is empty on failure, `error` is empty on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutcome {
    pub path: String,
    pub error: String,
}

impl ImageOutcome {
    pub fn saved(path: impl Into<String>) -> Self {
        ImageOutcome { path: path.into(), error: String::new() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ImageOutcome { path: String::new(), error: error.into() }
    }

    pub fn is_ok(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.is_ok().then(|| PathBuf::from(&self.path))
    }
}
