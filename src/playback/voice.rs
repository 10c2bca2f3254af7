//! Voice-call transport.
//!
//! The bot does not speak the group-call media protocol itself. A helper
//! process (configurable via `VOICE_STREAMER_BIN`) is spawned per track and
//! pipes the resolved audio stream into the chat's voice call. The helper
//! exiting on its own is the stream-end signal that drives queue advancement.

use async_trait::async_trait;
use std::collections::HashMap;
use teloxide::types::ChatId;
use thiserror::Error;
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::core::config;

/// Voice transport failures surfaced to handlers.
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The chat has no active voice session
    #[error("not in a voice call, use /join first")]
    NotJoined,

    /// The streamer helper could not be started
    #[error("failed to start voice streamer: {0}")]
    Spawn(String),
}

/// Seam between the playback logic and the actual voice-call transport.
///
/// `play` replaces whatever is currently streaming in the chat. A stream
/// that finishes on its own (not replaced, not stopped) must produce exactly
/// one stream-end event for its chat.
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Registers a voice session for the chat.
    async fn join(&self, chat_id: ChatId) -> Result<(), VoiceError>;

    /// Reports whether the chat has an active voice session.
    async fn is_joined(&self, chat_id: ChatId) -> bool;

    /// Starts streaming the given direct audio URL into the chat's call,
    /// replacing any current stream.
    async fn play(&self, chat_id: ChatId, stream_url: &str) -> Result<(), VoiceError>;

    /// Stops the current stream, keeping the session.
    ///
    /// Never emits a stream-end event.
    async fn stop(&self, chat_id: ChatId) -> Result<(), VoiceError>;

    /// Stops any current stream and drops the session.
    async fn leave(&self, chat_id: ChatId) -> Result<(), VoiceError>;
}

/// Per-chat session. `streaming` holds the kill switch of the running
/// helper; `None` means joined but idle.
type Sessions = HashMap<ChatId, Option<oneshot::Sender<()>>>;

/// `VoiceClient` backed by one helper process per playing track.
pub struct ProcessVoiceClient {
    sessions: Mutex<Sessions>,
    events_tx: mpsc::UnboundedSender<ChatId>,
}

impl ProcessVoiceClient {
    /// Creates the client and the stream-end event receiver.
    ///
    /// The receiver yields the `ChatId` of every stream that finished on its
    /// own. Streams replaced by another `play` or cut by `stop`/`leave` do
    /// not show up here.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChatId>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                sessions: Mutex::new(HashMap::new()),
                events_tx,
            },
            events_rx,
        )
    }

    /// Signals the running helper for this slot to terminate, if any.
    fn cut_stream(slot: &mut Option<oneshot::Sender<()>>) {
        if let Some(kill) = slot.take() {
            let _ = kill.send(());
        }
    }
}

#[async_trait]
impl VoiceClient for ProcessVoiceClient {
    async fn join(&self, chat_id: ChatId) -> Result<(), VoiceError> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(chat_id).or_insert(None);
        log::info!("Joined voice call in chat {}", chat_id);
        Ok(())
    }

    async fn is_joined(&self, chat_id: ChatId) -> bool {
        let sessions = self.sessions.lock().await;
        sessions.contains_key(&chat_id)
    }

    async fn play(&self, chat_id: ChatId, stream_url: &str) -> Result<(), VoiceError> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.get_mut(&chat_id).ok_or(VoiceError::NotJoined)?;
        Self::cut_stream(slot);

        let streamer_bin = &*config::VOICE_STREAMER_BIN;
        let mut child = TokioCommand::new(streamer_bin)
            .arg(chat_id.0.to_string())
            .arg(stream_url)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                log::error!("Failed to spawn {} for chat {}: {}", streamer_bin, chat_id, e);
                VoiceError::Spawn(e.to_string())
            })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        *slot = Some(kill_tx);

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(s) => log::debug!("Voice streamer for chat {} exited with {}", chat_id, s),
                        Err(e) => log::warn!("Voice streamer wait failed for chat {}: {}", chat_id, e),
                    }
                    let _ = events.send(chat_id);
                }
                _ = kill_rx => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    log::debug!("Voice streamer for chat {} cut", chat_id);
                }
            }
        });

        log::info!("Streaming into chat {}", chat_id);
        Ok(())
    }

    async fn stop(&self, chat_id: ChatId) -> Result<(), VoiceError> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.get_mut(&chat_id).ok_or(VoiceError::NotJoined)?;
        Self::cut_stream(slot);
        Ok(())
    }

    async fn leave(&self, chat_id: ChatId) -> Result<(), VoiceError> {
        let mut sessions = self.sessions.lock().await;
        let mut slot = sessions.remove(&chat_id).ok_or(VoiceError::NotJoined)?;
        Self::cut_stream(&mut slot);
        log::info!("Left voice call in chat {}", chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let (client, _rx) = ProcessVoiceClient::new();
        client.join(ChatId(1)).await.unwrap();
        client.join(ChatId(1)).await.unwrap();
        assert!(client.is_joined(ChatId(1)).await);
        assert!(!client.is_joined(ChatId(2)).await);
    }

    #[tokio::test]
    async fn test_play_without_join_fails() {
        let (client, _rx) = ProcessVoiceClient::new();
        let result = client.play(ChatId(1), "http://example.com/stream").await;
        assert!(matches!(result, Err(VoiceError::NotJoined)));
    }

    #[tokio::test]
    async fn test_leave_without_join_fails() {
        let (client, _rx) = ProcessVoiceClient::new();
        assert!(matches!(client.leave(ChatId(1)).await, Err(VoiceError::NotJoined)));
    }

    #[tokio::test]
    async fn test_leave_drops_session() {
        let (client, _rx) = ProcessVoiceClient::new();
        client.join(ChatId(1)).await.unwrap();
        client.leave(ChatId(1)).await.unwrap();
        assert!(!client.is_joined(ChatId(1)).await);
    }

    #[tokio::test]
    async fn test_stop_keeps_session() {
        let (client, _rx) = ProcessVoiceClient::new();
        client.join(ChatId(1)).await.unwrap();
        client.stop(ChatId(1)).await.unwrap();
        assert!(client.is_joined(ChatId(1)).await);
    }
}
