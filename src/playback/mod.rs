//! Voice-chat playback: per-chat queues, the advancement driver and the
//! voice transport.

pub mod driver;
pub mod queue;
pub mod voice;

pub use driver::{AdvanceOutcome, PlaybackDriver, StreamResolver, YtDlpResolver};
pub use queue::{EnqueueOutcome, PlayQueue, QueueEntry, QueueState};
pub use voice::{ProcessVoiceClient, VoiceClient, VoiceError};
