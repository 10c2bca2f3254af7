//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the bot. The handlers
//! are organized in a testable way, allowing integration tests to use the
//! same handler tree as production code.
//!
//! Every command and callback passes the channel-subscription gate before any
//! work happens. Errors never cross the endpoint boundary: each handler
//! renders its failure as a chat reply.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, UserId};
use teloxide::utils::command::BotCommands;

use crate::core::error::AppError;
use crate::core::subscription;
use crate::extract::{self, TrackResult};
use crate::playback::{AdvanceOutcome, EnqueueOutcome, PlaybackDriver, QueueEntry};
use crate::telegram::bot::Command;
use crate::telegram::downloads::download_and_send_audio;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback-data prefix for the download button under search results
pub const DOWNLOAD_CALLBACK_PREFIX: &str = "download_";

/// Callback-data prefix for the play-in-voice-chat button under search results
pub const PLAYVC_CALLBACK_PREFIX: &str = "playvc_";

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub driver: Arc<PlaybackDriver>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(driver: Arc<PlaybackDriver>) -> Self {
        Self { driver }
    }
}

/// Creates the main dispatcher schema for the bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. The same schema is used in production and in integration
/// tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);

                let user_id = match msg.from.as_ref().map(|u| u.id) {
                    Some(id) => id,
                    // Anonymous senders (channel posts) are ignored
                    None => return Ok(()),
                };

                let cmd_label = format!("{:?}", cmd);
                let result = match cmd {
                    Command::Start => handle_start_command(&bot, &msg).await,
                    Command::Help => handle_help_command(&bot, &msg).await,
                    Command::Search(query) => {
                        gated(&bot, msg.chat.id, user_id, handle_search_command(&bot, &msg, &query)).await
                    }
                    Command::Play(target) => {
                        gated(&bot, msg.chat.id, user_id, handle_play_command(&bot, &msg, &deps, &target)).await
                    }
                    Command::Join => gated(&bot, msg.chat.id, user_id, handle_join_command(&bot, &msg, &deps)).await,
                    Command::Leave => gated(&bot, msg.chat.id, user_id, handle_leave_command(&bot, &msg, &deps)).await,
                    Command::Stop => gated(&bot, msg.chat.id, user_id, handle_stop_command(&bot, &msg, &deps)).await,
                };

                if let Err(e) = result {
                    log::error!("Command {} failed in chat {}: {}", cmd_label, msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, user_facing_error(&e)).await;
                }
                Ok(())
            }
        },
    ))
}

/// Runs a handler behind the subscription gate.
///
/// Unsubscribed users get the join prompt instead; the wrapped future is
/// still constructed but never awaited in that case.
async fn gated<F>(bot: &Bot, chat_id: ChatId, user_id: UserId, action: F) -> Result<(), AppError>
where
    F: std::future::Future<Output = Result<(), AppError>>,
{
    if !subscription::is_subscribed(bot, user_id).await {
        send_gate_prompt(bot, chat_id).await?;
        return Ok(());
    }
    action.await
}

/// Sends the "join the channel first" prompt with the join button.
async fn send_gate_prompt(bot: &Bot, chat_id: ChatId) -> Result<(), AppError> {
    bot.send_message(chat_id, "You need to join our channel to use this bot.")
        .reply_markup(subscription::join_channel_keyboard())
        .await?;
    Ok(())
}

/// Renders an error for the chat. Internal details stay in the log.
fn user_facing_error(err: &AppError) -> String {
    match err {
        AppError::NotFound => "Nothing found, try a different query.".to_string(),
        AppError::UserInput(text) => text.clone(),
        AppError::Url(_) => "That does not look like a valid URL.".to_string(),
        AppError::Voice(e) => e.to_string(),
        AppError::Extract(e) => format!("Sorry, that did not work: {}", e),
        _ => "Something went wrong, please try again later.".to_string(),
    }
}

async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), AppError> {
    bot.send_message(
        msg.chat.id,
        "Hi! I search and play music.\n\n\
         /search <query> finds a track you can download as MP3.\n\
         /play <query or URL> queues a track in this chat's voice call.\n\
         /stop clears the queue, /leave disconnects me.\n\n\
         See /help for the full command list.",
    )
    .await?;
    Ok(())
}

async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), AppError> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

/// Handle /search: find the best match and offer it for download.
async fn handle_search_command(bot: &Bot, msg: &Message, query: &str) -> Result<(), AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::UserInput("Usage: /search <query>".to_string()));
    }

    let searching = bot.send_message(msg.chat.id, format!("Searching for '{}'...", query)).await?;

    let track = extract::search_track(query).await?.ok_or(AppError::NotFound)?;

    bot.delete_message(msg.chat.id, searching.id).await.ok();
    bot.send_message(msg.chat.id, search_result_text(&track))
        .reply_markup(search_result_keyboard(&track))
        .await?;
    Ok(())
}

fn search_result_text(track: &TrackResult) -> String {
    format!("{}\nDuration: {}", track.title, track.duration_display())
}

fn search_result_keyboard(track: &TrackResult) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![
        InlineKeyboardButton::callback(
            "Download MP3".to_string(),
            format!("{}{}", DOWNLOAD_CALLBACK_PREFIX, track.webpage_url),
        ),
        InlineKeyboardButton::callback(
            "Play in voice chat".to_string(),
            format!("{}{}", PLAYVC_CALLBACK_PREFIX, track.webpage_url),
        ),
    ]];
    if let Ok(url) = url::Url::parse(&track.webpage_url) {
        rows.push(vec![InlineKeyboardButton::url("Open".to_string(), url)]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Handle /play: resolve the target to a track and queue it for the voice call.
async fn handle_play_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, target: &str) -> Result<(), AppError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(AppError::UserInput("Usage: /play <query or URL>".to_string()));
    }

    let entry = if target.starts_with("http://") || target.starts_with("https://") {
        let parsed = url::Url::parse(target)?;
        let title = extract::ytdlp::fetch_title(parsed.as_str()).await?;
        QueueEntry::new(parsed.as_str().to_string(), title)
    } else {
        let track = extract::search_track(target).await?.ok_or(AppError::NotFound)?;
        QueueEntry::new(track.webpage_url, track.title)
    };

    queue_track(bot, msg.chat.id, deps, entry).await
}

/// Joins the voice call if needed, enqueues the track and reports the result.
///
/// Shared by /play and the play-in-voice-chat callback button.
async fn queue_track(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, entry: QueueEntry) -> Result<(), AppError> {
    let voice = deps.driver.voice();
    if !voice.is_joined(chat_id).await {
        voice.join(chat_id).await?;
    }

    let title = entry.title.clone();
    match deps.driver.queues().enqueue(chat_id, entry).await {
        EnqueueOutcome::StartedQueue => {
            let outcome = deps.driver.start(chat_id).await;
            if let Some(text) = advance_message(&outcome) {
                bot.send_message(chat_id, text).await?;
            }
        }
        EnqueueOutcome::Queued { position } => {
            bot.send_message(chat_id, format!("Queued at position {}: {}", position, title))
                .await?;
        }
        EnqueueOutcome::Full => {
            bot.send_message(chat_id, "The queue for this chat is full, try again later.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_join_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    deps.driver.voice().join(msg.chat.id).await?;
    bot.send_message(msg.chat.id, "Joined the voice chat. Queue tracks with /play.").await?;
    Ok(())
}

async fn handle_leave_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    let dropped = deps.driver.stop(msg.chat.id).await;
    deps.driver.voice().leave(msg.chat.id).await?;
    let text = if dropped > 0 {
        format!("Left the voice chat, dropped {} queued track(s).", dropped)
    } else {
        "Left the voice chat.".to_string()
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_stop_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    let dropped = deps.driver.stop(msg.chat.id).await;
    let text = if dropped > 0 {
        format!("Playback stopped, {} queued track(s) dropped.", dropped)
    } else {
        "Nothing is playing.".to_string()
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Renders a driver outcome as a chat announcement.
///
/// Used by the command handlers and by the stream-end listener. `None` means
/// there is nothing worth announcing.
pub fn advance_message(outcome: &AdvanceOutcome) -> Option<String> {
    match outcome {
        AdvanceOutcome::Started { entry, skipped } => {
            if skipped.is_empty() {
                Some(format!("Now playing: {}", entry.title))
            } else {
                Some(format!(
                    "Skipped {} unplayable track(s).\nNow playing: {}",
                    skipped.len(),
                    entry.title
                ))
            }
        }
        AdvanceOutcome::QueueExhausted { skipped } => {
            if skipped.is_empty() {
                Some("Queue finished.".to_string())
            } else {
                Some(format!("Skipped {} unplayable track(s). Queue finished.", skipped.len()))
            }
        }
        AdvanceOutcome::Aborted { .. } => {
            Some("Too many unplayable tracks in a row. Playback aborted and the queue was cleared.".to_string())
        }
        AdvanceOutcome::Idle => None,
    }
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let data = match q.data.as_deref() {
                Some(data) => data.to_string(),
                None => return Ok(()),
            };

            let chat_id = match q.message.as_ref().map(|m| m.chat().id) {
                Some(chat_id) => chat_id,
                None => {
                    bot.answer_callback_query(q.id.clone())
                        .text("This message is too old, search again.")
                        .await?;
                    return Ok(());
                }
            };

            if let Some(url) = data.strip_prefix(DOWNLOAD_CALLBACK_PREFIX) {
                if !subscription::is_subscribed(&bot, q.from.id).await {
                    bot.answer_callback_query(q.id.clone()).await?;
                    send_gate_prompt(&bot, chat_id).await?;
                    return Ok(());
                }

                bot.answer_callback_query(q.id.clone()).text("Downloading...").await?;
                if let Err(e) = download_and_send_audio(&bot, chat_id, url).await {
                    log::error!("Download failed for {} in chat {}: {}", url, chat_id, e);
                    let _ = bot.send_message(chat_id, user_facing_error(&e)).await;
                }
            } else if let Some(url) = data.strip_prefix(PLAYVC_CALLBACK_PREFIX) {
                if !subscription::is_subscribed(&bot, q.from.id).await {
                    bot.answer_callback_query(q.id.clone()).await?;
                    send_gate_prompt(&bot, chat_id).await?;
                    return Ok(());
                }

                bot.answer_callback_query(q.id.clone()).text("Queueing...").await?;
                let result = match extract::ytdlp::fetch_title(url).await {
                    Ok(title) => queue_track(&bot, chat_id, &deps, QueueEntry::new(url.to_string(), title)).await,
                    Err(e) => Err(AppError::Extract(e)),
                };
                if let Err(e) = result {
                    log::error!("Voice-chat queueing failed for {} in chat {}: {}", url, chat_id, e);
                    let _ = bot.send_message(chat_id, user_facing_error(&e)).await;
                }
            } else {
                log::warn!("Unknown callback data from user {}: {}", q.from.id, data);
                bot.answer_callback_query(q.id).await?;
            }
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> TrackResult {
        TrackResult {
            title: "Test Track".to_string(),
            webpage_url: "https://youtube.com/watch?v=abc123".to_string(),
            duration_secs: 245,
        }
    }

    /// Helper: extract all callback_data strings from a keyboard
    fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|btn| match &btn.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_search_result_text_includes_duration() {
        let text = search_result_text(&track());
        assert!(text.contains("Test Track"));
        assert!(text.contains("04:05"));
    }

    #[test]
    fn test_search_result_keyboard_carries_url_in_callbacks() {
        let keyboard = search_result_keyboard(&track());
        let data = callback_data(&keyboard);
        assert_eq!(
            data,
            vec![
                "download_https://youtube.com/watch?v=abc123".to_string(),
                "playvc_https://youtube.com/watch?v=abc123".to_string(),
            ]
        );
    }

    #[test]
    fn test_advance_message_started() {
        let outcome = AdvanceOutcome::Started {
            entry: QueueEntry::new("u".into(), "Song".into()),
            skipped: vec![],
        };
        assert_eq!(advance_message(&outcome), Some("Now playing: Song".to_string()));
    }

    #[test]
    fn test_advance_message_started_after_skips() {
        let outcome = AdvanceOutcome::Started {
            entry: QueueEntry::new("u".into(), "Song".into()),
            skipped: vec![QueueEntry::new("bad".into(), "Bad".into())],
        };
        let text = advance_message(&outcome).unwrap();
        assert!(text.contains("Skipped 1"));
        assert!(text.contains("Now playing: Song"));
    }

    #[test]
    fn test_advance_message_exhausted_and_idle() {
        assert_eq!(
            advance_message(&AdvanceOutcome::QueueExhausted { skipped: vec![] }),
            Some("Queue finished.".to_string())
        );
        assert_eq!(advance_message(&AdvanceOutcome::Idle), None);
    }

    #[test]
    fn test_advance_message_aborted() {
        let text = advance_message(&AdvanceOutcome::Aborted { skipped: vec![] }).unwrap();
        assert!(text.contains("aborted"));
    }

    #[test]
    fn test_user_facing_error_hides_internals() {
        let err = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"));
        assert!(!user_facing_error(&err).contains("disk on fire"));
    }

    #[test]
    fn test_user_facing_error_for_bad_url() {
        let err: AppError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, AppError::Url(_)));
        assert_eq!(user_facing_error(&err), "That does not look like a valid URL.");
    }
}
