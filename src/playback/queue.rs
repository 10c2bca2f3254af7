use std::collections::{HashMap, VecDeque};
use teloxide::types::ChatId;
use tokio::sync::Mutex;

/// Maximum number of tracks allowed per chat queue to prevent unbounded memory growth.
const MAX_QUEUE_SIZE: usize = 100;

/// A single queued track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Track page URL, resolved to a direct stream endpoint at play time
    pub url: String,
    /// Display title shown in chat
    pub title: String,
}

impl QueueEntry {
    pub fn new(url: String, title: String) -> Self {
        Self { url, title }
    }
}

/// Observable state of a chat's queue.
///
/// A queue is either absent (no entry for the chat at all) or non-empty.
/// An empty-but-present queue is not a representable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No queue exists for the chat; nothing is playing
    Absent,
    /// A queue exists; its head is the currently playing track
    NonEmpty,
}

/// Outcome of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The queue did not exist before; the caller should start playback
    StartedQueue,
    /// The track was appended behind `position - 1` others (1-based position)
    Queued { position: usize },
    /// The chat queue is at capacity; the track was rejected
    Full,
}

/// Thread-safe per-chat playback queues.
///
/// One FIFO queue per chat, keyed by `ChatId`. The head of a queue is the
/// track currently playing in that chat's voice call. Whenever a queue
/// becomes empty its key is removed, so presence of a key always means
/// playback is active.
pub struct PlayQueue {
    queues: Mutex<HashMap<ChatId, VecDeque<QueueEntry>>>,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayQueue {
    /// Creates a new store with no queues.
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a track to the chat's queue, creating the queue if absent.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - The chat whose queue receives the track
    /// * `entry` - The track to append
    ///
    /// # Returns
    ///
    /// `StartedQueue` when the queue did not exist before the call (the
    /// caller must start playback), `Queued { position }` with the 1-based
    /// position otherwise, or `Full` when the queue is at capacity.
    pub async fn enqueue(&self, chat_id: ChatId, entry: QueueEntry) -> EnqueueOutcome {
        let mut queues = self.queues.lock().await;
        match queues.get_mut(&chat_id) {
            Some(queue) => {
                if queue.len() >= MAX_QUEUE_SIZE {
                    log::warn!("Queue for chat {} is full ({} tracks), rejecting '{}'", chat_id, queue.len(), entry.title);
                    return EnqueueOutcome::Full;
                }
                queue.push_back(entry);
                EnqueueOutcome::Queued { position: queue.len() }
            }
            None => {
                let mut queue = VecDeque::new();
                queue.push_back(entry);
                queues.insert(chat_id, queue);
                EnqueueOutcome::StartedQueue
            }
        }
    }

    /// Returns a clone of the currently playing track without modifying the queue.
    pub async fn peek_head(&self, chat_id: ChatId) -> Option<QueueEntry> {
        let queues = self.queues.lock().await;
        queues.get(&chat_id).and_then(|q| q.front()).cloned()
    }

    /// Removes the finished head track and returns the next one, if any.
    ///
    /// When the popped track was the last one, the chat's queue is removed
    /// entirely and `None` is returned.
    pub async fn advance(&self, chat_id: ChatId) -> Option<QueueEntry> {
        let mut queues = self.queues.lock().await;
        let queue = queues.get_mut(&chat_id)?;
        queue.pop_front();
        match queue.front().cloned() {
            Some(next) => Some(next),
            None => {
                queues.remove(&chat_id);
                None
            }
        }
    }

    /// Drops the chat's queue entirely.
    ///
    /// # Returns
    ///
    /// The number of tracks discarded (0 when no queue existed).
    pub async fn clear(&self, chat_id: ChatId) -> usize {
        let mut queues = self.queues.lock().await;
        queues.remove(&chat_id).map(|q| q.len()).unwrap_or(0)
    }

    /// Reports whether a queue exists for the chat.
    pub async fn state(&self, chat_id: ChatId) -> QueueState {
        let queues = self.queues.lock().await;
        if queues.contains_key(&chat_id) {
            QueueState::NonEmpty
        } else {
            QueueState::Absent
        }
    }

    /// Returns the number of tracks queued for the chat.
    pub async fn len(&self, chat_id: ChatId) -> usize {
        let queues = self.queues.lock().await;
        queues.get(&chat_id).map(|q| q.len()).unwrap_or(0)
    }
}
