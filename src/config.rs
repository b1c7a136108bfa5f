//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenv;

use crate::error::{AppError, AppResult};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub output_dir: PathBuf,
    pub api_host: String,
    pub api_port: String,
    pub poll: PollSettings,
}

/// Batch polling cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(120),
            backoff: 1.5,
            timeout: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl PollSettings {
    /// Rejects cadences that would spin: a zero interval never grows.
    pub fn validate(self) -> AppResult<Self> {
        if self.interval.is_zero() {
            return Err(AppError::Config("POLL_INTERVAL_SECS must be at least 1".to_string()));
        }
        if self.max_interval < self.interval {
            return Err(AppError::Config(
                "POLL_MAX_INTERVAL_SECS must not be below POLL_INTERVAL_SECS".to_string(),
            ));
        }
        if !(self.backoff >= 1.0) {
            return Err(AppError::Config(format!("POLL_BACKOFF must be a number >= 1, got {}", self.backoff)));
        }
        Ok(self)
    }
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        let defaults = PollSettings::default();
        let poll = PollSettings {
            interval: secs_var("POLL_INTERVAL_SECS", defaults.interval)?,
            max_interval: secs_var("POLL_MAX_INTERVAL_SECS", defaults.max_interval)?,
            backoff: match env::var("POLL_BACKOFF") {
                Ok(v) => v
                    .parse::<f64>()
                    .ok()
                    .filter(|b| *b >= 1.0)
                    .ok_or_else(|| AppError::Config(format!("POLL_BACKOFF must be a number >= 1, got '{}'", v)))?,
                Err(_) => defaults.backoff,
            },
            timeout: secs_var("POLL_TIMEOUT_SECS", defaults.timeout)?,
        }
        .validate()?;
        Ok(Config {
            api_key: env::var("GOOGLE_API_KEY")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            text_model: env::var("TEXT_MODEL").unwrap_or_else(|_| DEFAULT_TEXT_MODEL.to_string()),
            image_model: env::var("IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string()),
            output_dir: PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| ".".to_string())),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8190".to_string()),
            poll,
        })
    }

    pub fn print_env_vars() {
        let key = env::var("GOOGLE_API_KEY").or_else(|_| env::var("GEMINI_API_KEY"));
        println!("GOOGLE_API_KEY: {}", key.map(|k| mask(&k)).unwrap_or_else(|_| "<unset>".to_string()));
        for name in ["GEMINI_BASE_URL", "TEXT_MODEL", "IMAGE_MODEL", "OUTPUT_DIR", "API_HOST", "API_PORT", "POLL_INTERVAL_SECS", "POLL_TIMEOUT_SECS"] {
            println!("{}: {}", name, env::var(name).unwrap_or_else(|_| "<unset>".to_string()));
        }
    }
}

fn secs_var(name: &str, default: Duration) -> AppResult<Duration> {
    match env::var(name) {
        Ok(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| AppError::Config(format!("{} must be a whole number of seconds, got '{}'", name, v))),
        Err(_) => Ok(default),
    }
}

/// Keeps the last four characters of a secret for display.
pub fn mask(secret: &str) -> String {
    let tail: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", tail)
    }
}
