//! Media extraction: search, stream resolution and audio download via yt-dlp.

pub mod error;
pub mod track;
pub mod ytdlp;

pub use error::ExtractError;
pub use track::{format_duration, TrackResult};
pub use ytdlp::{download_audio, resolve_stream_url, search_track, DownloadedTrack};
