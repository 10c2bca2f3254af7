//! Telegram bot integration and handlers

pub mod bot;
pub mod downloads;
pub mod handlers;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use downloads::download_and_send_audio;
pub use handlers::{advance_message, schema, HandlerDeps, HandlerError};
