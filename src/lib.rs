//! Melobot - Telegram music bot for channel subscribers
//!
//! Searches and downloads tracks via yt-dlp and plays queued music into
//! group voice chats. Every user-facing operation sits behind a mandatory
//! channel-subscription gate.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and the subscription gate
//! - `extract`: yt-dlp search, stream resolution and MP3 downloads
//! - `playback`: per-chat queues, the playback driver and the voice transport
//! - `telegram`: bot setup, command handlers and audio delivery

pub mod core;
pub mod extract;
pub mod playback;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use extract::{search_track, TrackResult};
pub use playback::{PlayQueue, PlaybackDriver, ProcessVoiceClient};
pub use telegram::{create_bot, schema, HandlerDeps};
