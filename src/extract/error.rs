use std::fmt;

/// Structured error type for extraction operations.
///
/// Categorized variants instead of a bare string so callers can decide
/// between "tell the user" and "skip and continue" without parsing messages.
#[derive(Debug)]
pub enum ExtractError {
    /// yt-dlp specific failures (binary not found, bad exit code, etc.)
    YtDlp(String),
    /// Search returned an empty result set
    NoResults,
    /// Extraction or transcode timed out
    Timeout(String),
    /// Expected file not found after transcoding
    FileNotFound(String),
    /// Process execution failure (spawn, exit code)
    Process(String),
    /// Catch-all for uncategorized errors
    Other(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::NoResults => write!(f, "no results"),
            ExtractError::YtDlp(msg)
            | ExtractError::Timeout(msg)
            | ExtractError::FileNotFound(msg)
            | ExtractError::Process(msg)
            | ExtractError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ExtractError {}

impl ExtractError {
    /// Returns subcategory for logging
    pub fn subcategory(&self) -> &'static str {
        match self {
            ExtractError::YtDlp(_) => "ytdlp",
            ExtractError::NoResults => "no_results",
            ExtractError::Timeout(_) => "timeout",
            ExtractError::FileNotFound(_) => "file_not_found",
            ExtractError::Process(_) => "process",
            ExtractError::Other(_) => "other",
        }
    }
}

/// Plain strings become `ExtractError::Other`
impl From<String> for ExtractError {
    fn from(s: String) -> Self {
        ExtractError::Other(s)
    }
}

impl From<&str> for ExtractError {
    fn from(s: &str) -> Self {
        ExtractError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_display() {
        let err = ExtractError::YtDlp("yt-dlp exited with code 1".into());
        assert_eq!(err.to_string(), "yt-dlp exited with code 1");
        assert_eq!(ExtractError::NoResults.to_string(), "no results");
    }

    #[test]
    fn test_extract_error_subcategory() {
        assert_eq!(ExtractError::YtDlp("".into()).subcategory(), "ytdlp");
        assert_eq!(ExtractError::NoResults.subcategory(), "no_results");
        assert_eq!(ExtractError::Timeout("".into()).subcategory(), "timeout");
        assert_eq!(ExtractError::Process("".into()).subcategory(), "process");
    }

    #[test]
    fn test_from_string() {
        let err: ExtractError = "boom".to_string().into();
        assert!(matches!(err, ExtractError::Other(_)));
    }
}
