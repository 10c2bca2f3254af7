//! Queue-driven playback advancement.
//!
//! All transitions for a chat (starting the head track, advancing on stream
//! end, stopping) run under that chat's advancement lock, so a stream-end
//! event racing a command never interleaves. Unplayable tracks are skipped
//! with a bounded counter per invocation; exceeding the bound clears the
//! queue instead of spinning through an endlessly failing playlist.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;

use crate::core::config;
use crate::extract::{self, ExtractError};
use crate::playback::queue::{PlayQueue, QueueEntry};
use crate::playback::voice::VoiceClient;

/// Resolves a track page URL to a direct audio stream endpoint.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<String, ExtractError>;
}

/// Production resolver backed by yt-dlp.
pub struct YtDlpResolver;

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<String, ExtractError> {
        extract::resolve_stream_url(url).await
    }
}

/// Result of one driver invocation.
#[derive(Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A track is now streaming; `skipped` lists tracks dropped on the way
    Started { entry: QueueEntry, skipped: Vec<QueueEntry> },
    /// The queue ran out; nothing is playing
    QueueExhausted { skipped: Vec<QueueEntry> },
    /// The skip bound was hit; the queue was cleared
    Aborted { skipped: Vec<QueueEntry> },
    /// No queue existed for the chat
    Idle,
}

/// Drives per-chat playback over the queue and the voice transport.
pub struct PlaybackDriver {
    queues: Arc<PlayQueue>,
    voice: Arc<dyn VoiceClient>,
    resolver: Arc<dyn StreamResolver>,
    locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl PlaybackDriver {
    pub fn new(queues: Arc<PlayQueue>, voice: Arc<dyn VoiceClient>, resolver: Arc<dyn StreamResolver>) -> Self {
        Self {
            queues,
            voice,
            resolver,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn queues(&self) -> &Arc<PlayQueue> {
        &self.queues
    }

    pub fn voice(&self) -> &Arc<dyn VoiceClient> {
        &self.voice
    }

    /// Returns the chat's advancement lock, creating it on first use.
    async fn chat_lock(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(chat_id).or_default().clone()
    }

    /// Starts playback of the chat's current head track.
    ///
    /// Called after an enqueue that created the queue.
    pub async fn start(&self, chat_id: ChatId) -> AdvanceOutcome {
        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;
        match self.queues.peek_head(chat_id).await {
            Some(head) => self.drive(chat_id, Some(head)).await,
            None => AdvanceOutcome::Idle,
        }
    }

    /// Advances the queue after a stream finished and starts the next track.
    pub async fn on_stream_end(&self, chat_id: ChatId) -> AdvanceOutcome {
        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;
        log::info!("Stream ended in chat {}", chat_id);
        match self.queues.advance(chat_id).await {
            Some(next) => self.drive(chat_id, Some(next)).await,
            None => {
                self.leave_call(chat_id).await;
                AdvanceOutcome::QueueExhausted { skipped: Vec::new() }
            }
        }
    }

    /// Clears the chat's queue and cuts the current stream.
    ///
    /// # Returns
    ///
    /// The number of tracks discarded.
    pub async fn stop(&self, chat_id: ChatId) -> usize {
        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;
        let dropped = self.queues.clear(chat_id).await;
        if let Err(e) = self.voice.stop(chat_id).await {
            log::debug!("No stream to stop in chat {}: {}", chat_id, e);
        }
        dropped
    }

    /// Plays `current` or, when it fails, skips forward through the queue.
    ///
    /// Loops rather than recursing. At most `MAX_SKIPS_PER_INVOCATION` tracks
    /// are dropped per call; hitting the bound clears the queue and gives up.
    /// Caller must hold the chat's advancement lock.
    async fn drive(&self, chat_id: ChatId, mut current: Option<QueueEntry>) -> AdvanceOutcome {
        let mut skipped = Vec::new();
        let mut skips: u32 = 0;

        while let Some(entry) = current {
            match self.try_play(chat_id, &entry).await {
                Ok(()) => {
                    log::info!("Now playing '{}' in chat {}", entry.title, chat_id);
                    return AdvanceOutcome::Started { entry, skipped };
                }
                Err(e) => {
                    log::warn!("Skipping unplayable track '{}' in chat {}: {}", entry.title, chat_id, e);
                }
            }

            skipped.push(entry);
            skips += 1;
            if skips >= config::playback::MAX_SKIPS_PER_INVOCATION {
                let dropped = self.queues.clear(chat_id).await;
                log::error!(
                    "Skip bound reached in chat {}, aborting playback and dropping {} queued tracks",
                    chat_id,
                    dropped
                );
                self.leave_call(chat_id).await;
                return AdvanceOutcome::Aborted { skipped };
            }

            tokio::time::sleep(config::playback::skip_delay()).await;
            current = self.queues.advance(chat_id).await;
        }

        self.leave_call(chat_id).await;
        AdvanceOutcome::QueueExhausted { skipped }
    }

    /// Leaves the chat's voice call once nothing is left to play.
    async fn leave_call(&self, chat_id: ChatId) {
        if let Err(e) = self.voice.leave(chat_id).await {
            log::debug!("No voice session to leave in chat {}: {}", chat_id, e);
        }
    }

    async fn try_play(&self, chat_id: ChatId, entry: &QueueEntry) -> Result<(), String> {
        let stream_url = match self.resolver.resolve(&entry.url).await {
            Ok(url) => url,
            Err(e) => return Err(format!("{} [{}]", e, e.subcategory())),
        };
        self.voice
            .play(chat_id, &stream_url)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::EnqueueOutcome;
    use crate::playback::voice::VoiceError;
    use std::collections::HashSet;
    use tokio::sync::Mutex as AsyncMutex;

    struct ScriptedResolver {
        failing: HashSet<String>,
    }

    impl ScriptedResolver {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl StreamResolver for ScriptedResolver {
        async fn resolve(&self, url: &str) -> Result<String, ExtractError> {
            if self.failing.contains(url) {
                Err(ExtractError::YtDlp(format!("unavailable: {}", url)))
            } else {
                Ok(format!("stream://{}", url))
            }
        }
    }

    #[derive(Default)]
    struct RecordingVoice {
        plays: AsyncMutex<Vec<(ChatId, String)>>,
        leaves: AsyncMutex<Vec<ChatId>>,
    }

    #[async_trait]
    impl VoiceClient for RecordingVoice {
        async fn join(&self, _chat_id: ChatId) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn is_joined(&self, _chat_id: ChatId) -> bool {
            true
        }

        async fn play(&self, chat_id: ChatId, stream_url: &str) -> Result<(), VoiceError> {
            self.plays.lock().await.push((chat_id, stream_url.to_string()));
            Ok(())
        }

        async fn stop(&self, _chat_id: ChatId) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn leave(&self, chat_id: ChatId) -> Result<(), VoiceError> {
            self.leaves.lock().await.push(chat_id);
            Ok(())
        }
    }

    fn entry(url: &str) -> QueueEntry {
        QueueEntry::new(url.to_string(), format!("title of {}", url))
    }

    fn driver_with(failing: &[&str]) -> (PlaybackDriver, Arc<RecordingVoice>) {
        let voice = Arc::new(RecordingVoice::default());
        let driver = PlaybackDriver::new(
            Arc::new(PlayQueue::new()),
            voice.clone(),
            Arc::new(ScriptedResolver::new(failing)),
        );
        (driver, voice)
    }

    #[tokio::test]
    async fn test_start_plays_head() {
        let (driver, voice) = driver_with(&[]);
        driver.queues().enqueue(ChatId(1), entry("a")).await;

        let outcome = driver.start(ChatId(1)).await;
        assert_eq!(
            outcome,
            AdvanceOutcome::Started {
                entry: entry("a"),
                skipped: vec![]
            }
        );
        assert_eq!(voice.plays.lock().await.as_slice(), &[(ChatId(1), "stream://a".to_string())]);
    }

    #[tokio::test]
    async fn test_start_on_absent_queue_is_idle() {
        let (driver, voice) = driver_with(&[]);
        assert_eq!(driver.start(ChatId(1)).await, AdvanceOutcome::Idle);
        assert!(voice.plays.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_advances_to_next() {
        let (driver, voice) = driver_with(&[]);
        driver.queues().enqueue(ChatId(1), entry("a")).await;
        driver.queues().enqueue(ChatId(1), entry("b")).await;
        driver.start(ChatId(1)).await;

        let outcome = driver.on_stream_end(ChatId(1)).await;
        assert_eq!(
            outcome,
            AdvanceOutcome::Started {
                entry: entry("b"),
                skipped: vec![]
            }
        );
        assert_eq!(voice.plays.lock().await.len(), 2);
        assert_eq!(driver.queues().peek_head(ChatId(1)).await, Some(entry("b")));
    }

    #[tokio::test]
    async fn test_stream_end_on_last_track_exhausts_queue() {
        let (driver, voice) = driver_with(&[]);
        driver.queues().enqueue(ChatId(1), entry("a")).await;
        driver.start(ChatId(1)).await;

        let outcome = driver.on_stream_end(ChatId(1)).await;
        assert_eq!(outcome, AdvanceOutcome::QueueExhausted { skipped: vec![] });
        assert_eq!(driver.queues().len(ChatId(1)).await, 0);
        assert_eq!(voice.leaves.lock().await.as_slice(), &[ChatId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplayable_tracks_are_skipped() {
        let (driver, voice) = driver_with(&["bad1", "bad2"]);
        driver.queues().enqueue(ChatId(1), entry("bad1")).await;
        driver.queues().enqueue(ChatId(1), entry("bad2")).await;
        driver.queues().enqueue(ChatId(1), entry("good")).await;

        let outcome = driver.start(ChatId(1)).await;
        assert_eq!(
            outcome,
            AdvanceOutcome::Started {
                entry: entry("good"),
                skipped: vec![entry("bad1"), entry("bad2")]
            }
        );
        assert_eq!(voice.plays.lock().await.as_slice(), &[(ChatId(1), "stream://good".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_bad_queue_drains_to_exhausted() {
        let (driver, voice) = driver_with(&["bad1", "bad2", "bad3"]);
        driver.queues().enqueue(ChatId(1), entry("bad1")).await;
        driver.queues().enqueue(ChatId(1), entry("bad2")).await;
        driver.queues().enqueue(ChatId(1), entry("bad3")).await;

        let outcome = driver.start(ChatId(1)).await;
        assert_eq!(
            outcome,
            AdvanceOutcome::QueueExhausted {
                skipped: vec![entry("bad1"), entry("bad2"), entry("bad3")]
            }
        );
        assert_eq!(driver.queues().len(ChatId(1)).await, 0);
        assert!(voice.plays.lock().await.is_empty());
        assert_eq!(voice.leaves.lock().await.as_slice(), &[ChatId(1)]);
    }

    struct EmptyResolver;

    #[async_trait]
    impl StreamResolver for EmptyResolver {
        async fn resolve(&self, _url: &str) -> Result<String, ExtractError> {
            Err(ExtractError::NoResults)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_without_results_skips_the_track() {
        let voice = Arc::new(RecordingVoice::default());
        let driver = PlaybackDriver::new(Arc::new(PlayQueue::new()), voice.clone(), Arc::new(EmptyResolver));
        driver.queues().enqueue(ChatId(1), entry("a")).await;

        let outcome = driver.start(ChatId(1)).await;
        assert_eq!(outcome, AdvanceOutcome::QueueExhausted { skipped: vec![entry("a")] });
        assert!(voice.plays.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_bound_aborts_and_clears_queue() {
        let bad: Vec<String> = (0..10).map(|n| format!("bad{}", n)).collect();
        let bad_refs: Vec<&str> = bad.iter().map(|s| s.as_str()).collect();
        let (driver, voice) = driver_with(&bad_refs);
        for url in &bad {
            driver.queues().enqueue(ChatId(1), entry(url)).await;
        }

        let outcome = driver.start(ChatId(1)).await;
        match outcome {
            AdvanceOutcome::Aborted { skipped } => {
                assert_eq!(skipped.len(), config::playback::MAX_SKIPS_PER_INVOCATION as usize);
            }
            other => panic!("expected Aborted, got {:?}", other),
        }
        assert_eq!(driver.queues().len(ChatId(1)).await, 0);
        assert!(voice.plays.lock().await.is_empty());
        assert_eq!(voice.leaves.lock().await.as_slice(), &[ChatId(1)]);
    }

    #[tokio::test]
    async fn test_stop_clears_queue() {
        let (driver, _voice) = driver_with(&[]);
        driver.queues().enqueue(ChatId(1), entry("a")).await;
        driver.queues().enqueue(ChatId(1), entry("b")).await;
        driver.start(ChatId(1)).await;

        assert_eq!(driver.stop(ChatId(1)).await, 2);
        assert_eq!(driver.queues().enqueue(ChatId(1), entry("c")).await, EnqueueOutcome::StartedQueue);
    }

    #[tokio::test]
    async fn test_chats_advance_independently() {
        let (driver, voice) = driver_with(&[]);
        driver.queues().enqueue(ChatId(1), entry("a")).await;
        driver.queues().enqueue(ChatId(2), entry("b")).await;

        driver.start(ChatId(1)).await;
        driver.start(ChatId(2)).await;
        driver.on_stream_end(ChatId(1)).await;

        assert_eq!(driver.queues().len(ChatId(1)).await, 0);
        assert_eq!(driver.queues().len(ChatId(2)).await, 1);
        assert_eq!(voice.plays.lock().await.len(), 2);
    }
}
