//! yt-dlp invocations: search, stream-URL resolution, audio download.
//!
//! Every call shells out to the configured yt-dlp binary with a timeout.
//! Nothing here retries; callers decide whether a failure is fatal
//! (search/download) or a skip signal (the playback driver).

use crate::core::config;
use crate::extract::error::ExtractError;
use crate::extract::track::{sanitize_title_for_filename, RawSearchDump, TrackResult};
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// A finished download: local file plus the resolved display title.
#[derive(Debug, Clone)]
pub struct DownloadedTrack {
    pub path: PathBuf,
    pub title: String,
}

/// Runs yt-dlp with the given arguments under the standard timeout.
async fn run_ytdlp(args: &[&str]) -> Result<Output, ExtractError> {
    let ytdl_bin = &*config::YTDL_BIN;
    log::debug!("yt-dlp command: {} {}", ytdl_bin, args.join(" "));

    timeout(config::extract::ytdlp_timeout(), TokioCommand::new(ytdl_bin).args(args).output())
        .await
        .map_err(|_| {
            log::error!(
                "yt-dlp command timed out after {} seconds",
                config::extract::YTDLP_TIMEOUT_SECS
            );
            ExtractError::Timeout("yt-dlp command timed out".to_string())
        })?
        .map_err(|e| {
            log::error!("Failed to execute {}: {}", ytdl_bin, e);
            ExtractError::Process(format!("Failed to execute {}: {}", ytdl_bin, e))
        })
}

/// Returns stderr trimmed to its most useful tail line for user display.
fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("yt-dlp failed with no error output")
        .to_string()
}

/// Searches the platform for the best match to a free-text query.
///
/// Uses `ytsearch1:` so at most one result comes back, never a playlist.
///
/// # Returns
///
/// `Ok(None)` when the search produced no entries; `Ok(Some(track))` with the
/// normalized title/URL/duration otherwise.
///
/// # Errors
///
/// Returns `ExtractError` when yt-dlp cannot be executed, times out, exits
/// non-zero, or emits unparsable JSON.
pub async fn search_track(query: &str) -> Result<Option<TrackResult>, ExtractError> {
    let search_target = format!("ytsearch1:{}", query);
    let output = run_ytdlp(&["-J", "--no-playlist", "--skip-download", &search_target]).await?;

    if !output.status.success() {
        let summary = stderr_summary(&output);
        log::error!("yt-dlp search failed for '{}': {}", query, summary);
        return Err(ExtractError::YtDlp(summary));
    }

    let dump: RawSearchDump = serde_json::from_slice(&output.stdout)
        .map_err(|e| ExtractError::YtDlp(format!("Unparsable yt-dlp search output: {}", e)))?;

    let track = dump.entries.into_iter().find_map(|entry| entry.into_track());
    match &track {
        Some(t) => log::info!("Search '{}' resolved to '{}' ({})", query, t.title, t.webpage_url),
        None => log::info!("Search '{}' produced no results", query),
    }
    Ok(track)
}

/// Resolves a track URL to a direct audio stream endpoint.
///
/// Streaming handoff only, no download. The returned URL is what the voice
/// streamer pipes into the call.
pub async fn resolve_stream_url(url: &str) -> Result<String, ExtractError> {
    let output = run_ytdlp(&["-g", "-f", "bestaudio/best", "--no-playlist", url]).await?;

    if !output.status.success() {
        let summary = stderr_summary(&output);
        log::warn!("Stream resolution failed for {}: {}", url, summary);
        return Err(ExtractError::YtDlp(summary));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let endpoint = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .ok_or_else(|| {
            log::warn!("yt-dlp returned no stream URL for {}", url);
            ExtractError::NoResults
        })?;

    log::debug!("Resolved {} to direct stream endpoint", url);
    Ok(endpoint)
}

/// Fetches the title for a URL without downloading anything.
pub async fn fetch_title(url: &str) -> Result<String, ExtractError> {
    let output = run_ytdlp(&["--print", "%(title)s", "--no-playlist", "--skip-download", url]).await?;

    if !output.status.success() {
        return Err(ExtractError::YtDlp(stderr_summary(&output)));
    }

    let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if title.is_empty() {
        return Err(ExtractError::YtDlp(format!("yt-dlp returned empty title for {}", url)));
    }
    Ok(title)
}

/// Downloads best-available audio and transcodes it to MP3.
///
/// The file lands in the downloads working directory (created on demand)
/// under a filename derived from the track title. The caller owns deletion
/// after delivery.
///
/// # Errors
///
/// Returns `ExtractError` on extraction/transcode failure or when the
/// expected output file is missing afterwards. Never retried here.
pub async fn download_audio(url: &str) -> Result<DownloadedTrack, ExtractError> {
    let dir = config::download_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ExtractError::Other(format!("Failed to create {}: {}", dir.display(), e)))?;

    let title = fetch_title(url).await?;
    let stem = sanitize_title_for_filename(&title);
    let out_template = dir.join(format!("{}.%(ext)s", stem));
    let out_template_str = out_template.to_string_lossy().to_string();

    let output = run_ytdlp(&[
        "-x",
        "--audio-format",
        "mp3",
        "--audio-quality",
        config::extract::AUDIO_BITRATE,
        "-f",
        "bestaudio/best",
        "--no-playlist",
        "-o",
        &out_template_str,
        url,
    ])
    .await?;

    if !output.status.success() {
        let summary = stderr_summary(&output);
        log::error!("Audio download failed for {}: {}", url, summary);
        return Err(ExtractError::YtDlp(summary));
    }

    let path = dir.join(format!("{}.mp3", stem));
    if !path.exists() {
        return Err(ExtractError::FileNotFound(format!(
            "Transcoded file not found at {}",
            path.display()
        )));
    }

    log::info!("Downloaded '{}' to {}", title, path.display());
    Ok(DownloadedTrack { path, title })
}

/// Logs the installed yt-dlp version at startup.
///
/// A missing binary is logged, not fatal. The first user request will
/// surface the failure anyway.
pub async fn log_ytdlp_version() {
    let ytdl_bin = &*config::YTDL_BIN;
    let result = timeout(
        std::time::Duration::from_secs(10),
        TokioCommand::new(ytdl_bin).arg("--version").output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            log::info!("yt-dlp version: {}", version);
        }
        Ok(Ok(output)) => {
            log::warn!("yt-dlp --version exited with {:?}", output.status.code());
        }
        Ok(Err(e)) => {
            log::warn!("Failed to run {} --version: {}. Downloads will fail until it is installed.", ytdl_bin, e);
        }
        Err(_) => {
            log::warn!("yt-dlp --version timed out");
        }
    }
}
