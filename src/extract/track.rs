use serde::Deserialize;

/// Placeholder shown when the extractor reports no title.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Normalized search result: title, canonical URL and duration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackResult {
    pub title: String,
    pub webpage_url: String,
    /// Duration in whole seconds; 0 when the extractor does not report one.
    pub duration_secs: u64,
}

impl TrackResult {
    /// Duration rendered as `MM:SS`.
    pub fn duration_display(&self) -> String {
        format_duration(self.duration_secs)
    }
}

/// Raw yt-dlp JSON entry, only the fields we consume.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    /// yt-dlp emits durations as floats for some extractors
    pub duration: Option<f64>,
}

/// Top-level yt-dlp search dump (`ytsearch1:` produces a playlist wrapper).
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchDump {
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

impl RawEntry {
    /// Converts a raw entry into a normalized result.
    /// Returns `None` when the entry has no canonical URL to act on.
    pub(crate) fn into_track(self) -> Option<TrackResult> {
        let webpage_url = self.webpage_url?;
        Some(TrackResult {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            webpage_url,
            duration_secs: self.duration.map(|d| d.round().max(0.0) as u64).unwrap_or(0),
        })
    }
}

/// Formats whole seconds as `MM:SS` (minutes are not capped at 59).
pub fn format_duration(total_secs: u64) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

/// Derives a safe filename stem from a track title.
///
/// Path separators and shell-hostile characters are replaced so a title like
/// "AC/DC - Back in Black" cannot escape the downloads directory.
pub fn sanitize_title_for_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        UNKNOWN_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}
