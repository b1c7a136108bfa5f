//! Common error type and result alias.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected Gemini response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No API key configured; set GOOGLE_API_KEY or provide one for this session")]
    MissingApiKey,

    #[error("Source image not found: {0}")]
    MissingSourceImage(String),

    #[error("Enter a name or traits before generating a character image")]
    MissingCharacterDetails,

    #[error("Complete every character's name, traits and image first")]
    IncompleteCharacters,

    #[error("Enter a story title first")]
    MissingTitle,

    #[error("Generate or write the story text first")]
    MissingStory,

    #[error("At most {0} characters are allowed")]
    TooManyCharacters(usize),

    #[error("Page count must be between 1 and 100, got {0}")]
    InvalidPageCount(u32),

    #[error("Uploads must be images, got content type '{0}'")]
    UnsupportedImageType(String),

    #[error("Unsupported aspect ratio: {0}")]
    InvalidAspectRatio(String),

    #[error("No {kind} at position {index}")]
    InvalidIndex { kind: &'static str, index: usize },

    #[error("Batch job {0} did not finish before the polling timeout")]
    PollTimeout(String),

    #[error("Polling of batch job {0} was cancelled")]
    PollCancelled(String),

    #[error("No session with id {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// True for errors raised before any remote call because the caller's input
    /// was not ready.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AppError::MissingSourceImage(_)
                | AppError::MissingCharacterDetails
                | AppError::IncompleteCharacters
                | AppError::MissingTitle
                | AppError::MissingStory
                | AppError::TooManyCharacters(_)
                | AppError::InvalidAspectRatio(_)
                | AppError::InvalidPageCount(_)
                | AppError::UnsupportedImageType(_)
                | AppError::InvalidIndex { .. }
                | AppError::MissingApiKey
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
