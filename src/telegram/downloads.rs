//! Downloading a track and delivering it as an audio message.

use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::core::error::{AppError, AppResult};
use crate::extract;

/// Downloads the track at `url` as MP3 and sends it into the chat.
///
/// A status message tracks progress (downloading, then uploading) and is
/// deleted once the audio is delivered. The local file is removed after
/// sending; a failed removal is logged and otherwise ignored.
///
/// # Errors
///
/// Returns `AppError` when extraction or the Telegram upload fails. The
/// status message is rewritten with a short failure note in that case.
pub async fn download_and_send_audio(bot: &Bot, chat_id: ChatId, url: &str) -> AppResult<()> {
    log::info!("Starting audio download for chat {}: {}", chat_id, url);
    let status = bot.send_message(chat_id, "Downloading audio...").await?;

    let track = match extract::download_audio(url).await {
        Ok(track) => track,
        Err(e) => {
            let _ = bot.edit_message_text(chat_id, status.id, "Download failed.").await;
            return Err(AppError::Extract(e));
        }
    };

    bot.edit_message_text(chat_id, status.id, "Uploading to Telegram...").await?;

    let send_result = bot
        .send_audio(chat_id, InputFile::file(&track.path))
        .caption(track.title.clone())
        .await;

    // The local copy is spent either way
    if let Err(e) = tokio::fs::remove_file(&track.path).await {
        log::warn!("Failed to remove {}: {}", track.path.display(), e);
    }

    match send_result {
        Ok(_) => {
            bot.delete_message(chat_id, status.id).await.ok();
            log::info!("Delivered '{}' to chat {}", track.title, chat_id);
            Ok(())
        }
        Err(e) => {
            let _ = bot.edit_message_text(chat_id, status.id, "Upload failed.").await;
            Err(AppError::Telegram(e))
        }
    }
}
