use crate::extract::ExtractError;
use thiserror::Error;

/// Centralized error types for the application
///
/// Every handler converts these into a user-visible reply at its boundary;
/// none of them crash the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Extraction, transcode or voice-streamer failures, carrying the
    /// underlying message
    #[error("{0}")]
    Extract(#[from] ExtractError),

    /// Voice transport failures
    #[error("{0}")]
    Voice(#[from] crate::playback::VoiceError),

    /// Search yielded no results
    #[error("nothing found")]
    NotFound,

    /// Malformed command (missing argument, bad URL)
    #[error("{0}")]
    UserInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
