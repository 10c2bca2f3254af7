//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup.
///
/// Secrets are never printed; the token is reported only as present/absent.
pub fn log_startup_configuration() {
    log::info!("yt-dlp binary: {}", *config::YTDL_BIN);
    log::info!("Download folder: {}", config::download_dir().display());
    log::info!("Voice streamer binary: {}", *config::VOICE_STREAMER_BIN);

    match *config::FORCE_SUB_CHANNEL_ID {
        Some(id) => log::info!("Required channel id: {}", id),
        None => log::error!("FORCE_SUB_CHANNEL_ID is not configured; all subscription checks will deny"),
    }

    if config::FORCE_SUB_CHANNEL_INVITE.is_none() {
        log::warn!("FORCE_SUB_CHANNEL_INVITE not set; deriving join link from the channel id");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let path_str = path.to_str().unwrap();

        // No other test installs a logger, so the first init succeeds
        init_logger(path_str).unwrap();
        assert!(path.exists());

        // A second global logger cannot be installed in the same process
        assert!(init_logger(path_str).is_err());
    }
}
