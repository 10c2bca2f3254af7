use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Identifier of the channel every user must be subscribed to.
/// Read from FORCE_SUB_CHANNEL_ID environment variable (e.g. -1001234567890).
/// `None` when unset or unparsable; startup validation rejects both cases.
pub static FORCE_SUB_CHANNEL_ID: Lazy<Option<i64>> = Lazy::new(|| {
    let raw = env::var("FORCE_SUB_CHANNEL_ID").ok()?;
    match raw.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(e) => {
            log::error!("Invalid FORCE_SUB_CHANNEL_ID '{}': {}", raw, e);
            None
        }
    }
});

/// Public invite link shown on the "join the channel" keyboard.
/// Read from FORCE_SUB_CHANNEL_INVITE environment variable.
/// When unset, a t.me/c/ link is derived from the channel identifier.
pub static FORCE_SUB_CHANNEL_INVITE: Lazy<Option<String>> = Lazy::new(|| env::var("FORCE_SUB_CHANNEL_INVITE").ok());

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable, defaults to "downloads"
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// External voice-call streamer helper binary.
/// Read from VOICE_STREAMER_BIN environment variable.
/// The helper owns the MTProto voice transport; the bot only spawns it with
/// a chat id and a direct stream URL and watches for process exit.
pub static VOICE_STREAMER_BIN: Lazy<String> =
    Lazy::new(|| env::var("VOICE_STREAMER_BIN").unwrap_or_else(|_| "voice-streamer".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Returns the download folder with tilde expansion applied.
pub fn download_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DOWNLOAD_FOLDER.as_str()).to_string())
}

/// Extraction configuration
pub mod extract {
    use super::Duration;

    /// Timeout for yt-dlp commands (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 120; // 2 minutes

    /// Audio bitrate passed to the MP3 transcode step
    pub const AUDIO_BITRATE: &str = "192K";

    /// yt-dlp command timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }
}

/// Playback driver configuration
pub mod playback {
    use super::Duration;

    /// Maximum number of unresolvable tracks skipped in one driver invocation.
    /// Exceeding the bound aborts playback for the chat instead of grinding
    /// through an arbitrarily long queue of dead URLs.
    pub const MAX_SKIPS_PER_INVOCATION: u32 = 5;

    /// Delay between consecutive skip attempts (in milliseconds)
    pub const SKIP_DELAY_MS: u64 = 500;

    /// Skip delay duration
    pub fn skip_delay() -> Duration {
        Duration::from_millis(SKIP_DELAY_MS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for HTTP requests (in seconds)
    /// Generous because audio uploads can take a while on slow links
    pub const REQUEST_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Validates required configuration at startup.
///
/// Fails fast with a clear diagnostic instead of letting the first handler
/// trip over an empty token or an unparsable channel id.
pub fn validate_startup() -> anyhow::Result<()> {
    if BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable is not set");
    }

    match env::var("FORCE_SUB_CHANNEL_ID") {
        Ok(raw) => {
            raw.trim()
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("FORCE_SUB_CHANNEL_ID '{}' is not a valid chat id: {}", raw, e))?;
        }
        Err(_) => anyhow::bail!("FORCE_SUB_CHANNEL_ID environment variable is not set"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_validate_startup_requires_token() {
        std::env::remove_var("BOT_TOKEN");
        std::env::remove_var("TELOXIDE_TOKEN");
        // BOT_TOKEN static may already be initialized from the environment;
        // only assert when it resolved to empty.
        if BOT_TOKEN.is_empty() {
            assert!(validate_startup().is_err());
        }
    }

    #[test]
    #[serial]
    fn test_validate_startup_rejects_bad_channel_id() {
        if BOT_TOKEN.is_empty() {
            return;
        }
        std::env::set_var("FORCE_SUB_CHANNEL_ID", "not-a-number");
        assert!(validate_startup().is_err());
        std::env::remove_var("FORCE_SUB_CHANNEL_ID");
    }

    #[test]
    fn test_download_dir_expands_tilde() {
        // DOWNLOAD_FOLDER defaults to a relative path; the expansion must
        // never leave a literal tilde in the result.
        let dir = download_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
    }
}
