//! Error types for Storyline.

use thiserror::Error;

/// Library-level error type for Storyline operations.
#[derive(Error, Debug)]
pub enum StorylineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Story generation failed: {0}")]
    UpstreamGeneration(String),

    #[error("Speech synthesis failed: {0}")]
    UpstreamSynthesis(String),

    #[error("Storage upload failed: {0}")]
    UpstreamUpload(String),

    #[error("Audio tool failed: {0}")]
    AudioTool(String),

    #[error("Remote run failed: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Storyline operations.
pub type Result<T> = std::result::Result<T, StorylineError>;
