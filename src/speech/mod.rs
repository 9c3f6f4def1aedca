//! Speech capture and playback.
//!
//! # Architecture
//!
//! ```text
//!  Recognizer (trait) ──▶ CaptureController ──┐
//!                                             ├──▶ SharedSession
//!  Synthesizer (trait) ─▶ PlaybackController ─┘
//! ```
//!
//! The host capabilities sit behind the object-safe [`Recognizer`] and
//! [`Synthesizer`] traits.  [`CommandRecognizer`] / [`CommandSynthesizer`]
//! drive external programs; [`Capabilities::probe`] decides at startup which
//! of them are usable.  A missing capability is `None` in the controllers,
//! never an error at startup.
//!
//! Controllers run each session or utterance as a spawned tokio task and
//! hand back a [`SpeechTask`] that resolves to the outcome, or to `None`
//! when the task was cancelled.

pub mod capability;
pub mod capture;
pub mod host;
pub mod playback;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::session::InteractionState;

pub use capability::Capabilities;
pub use capture::{CaptureController, CaptureOutcome, CaptureStart};
pub use host::{CommandRecognizer, CommandSynthesizer};
pub use playback::{PlaybackController, PlaybackOutcome};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors from the speech subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// The host has no such capability.
    #[error("{0} is not supported on this host")]
    Unavailable(&'static str),

    /// Capture was requested while the assistant is busy with something else.
    #[error("cannot start voice input while {}", .0.label())]
    Busy(InteractionState),

    /// The host capability reported an error; the code is passed through
    /// verbatim (e.g. `no-speech`, `not-allowed`).
    #[error("{0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// One candidate transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: Option<f32>,
}

impl Alternative {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            confidence: None,
        }
    }
}

/// One recognised segment with its alternatives, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    pub alternatives: Vec<Alternative>,
}

/// Single-shot voice-to-text.
///
/// Dropping the returned future must cancel the recognition.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, locale: &str) -> Result<Vec<RecognitionResult>, SpeechError>;
}

/// Text-to-speech.  Resolves when the utterance has finished playing.
///
/// Dropping the returned future must stop the utterance.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

// ---------------------------------------------------------------------------
// SpeechTask
// ---------------------------------------------------------------------------

/// Handle to a running capture session or utterance.
#[derive(Debug)]
pub struct SpeechTask<T> {
    id: u64,
    handle: JoinHandle<T>,
}

impl<T> SpeechTask<T> {
    fn new(id: u64, handle: JoinHandle<T>) -> Self {
        Self { id, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task.  `None` means it was cancelled.
    pub async fn wait(self) -> Option<T> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                log::error!("speech: task {} panicked: {e}", self.id);
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    /// Recognizer that waits until released, then returns a fixed result.
    pub struct MockRecognizer {
        result: Result<Vec<RecognitionResult>, SpeechError>,
        release: Notify,
        pub calls: AtomicUsize,
    }

    impl MockRecognizer {
        pub fn hears(alternatives: &[&[&str]]) -> Self {
            let results = alternatives
                .iter()
                .map(|alts| RecognitionResult {
                    alternatives: alts.iter().map(|t| Alternative::new(*t)).collect(),
                })
                .collect();
            Self::with(Ok(results))
        }

        pub fn fails(code: &str) -> Self {
            Self::with(Err(SpeechError::Runtime(code.into())))
        }

        fn with(result: Result<Vec<RecognitionResult>, SpeechError>) -> Self {
            Self {
                result,
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn release(&self) {
            self.release.notify_one();
        }
    }

    #[async_trait]
    impl Recognizer for MockRecognizer {
        async fn recognize(&self, _locale: &str) -> Result<Vec<RecognitionResult>, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            self.result.clone()
        }
    }

    /// Synthesizer that records what it was asked to say and finishes only
    /// when released.
    #[derive(Default)]
    pub struct MockSynthesizer {
        pub spoken: Mutex<Vec<String>>,
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
        release: Notify,
        fail: bool,
    }

    impl MockSynthesizer {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn release(&self) {
            self.release.notify_one();
        }

        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    struct LiveGuard<'a>(&'a AtomicUsize);

    impl Drop for LiveGuard<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Synthesizer for MockSynthesizer {
        async fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(now, Ordering::SeqCst);
            let _guard = LiveGuard(&self.live);

            self.release.notified().await;
            if self.fail {
                Err(SpeechError::Runtime("synthesis-failed".into()))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_error_names_mode() {
        let err = SpeechError::Busy(InteractionState::Processing);
        assert_eq!(err.to_string(), "cannot start voice input while Processing...");
    }

    #[test]
    fn traits_are_object_safe() {
        fn _recognizer(_: Box<dyn Recognizer>) {}
        fn _synthesizer(_: Box<dyn Synthesizer>) {}
    }

    #[tokio::test]
    async fn aborted_task_waits_to_none() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let task = SpeechTask::new(7, handle);
        task.handle.abort();
        assert_eq!(task.id(), 7);
        assert!(task.wait().await.is_none());
    }
}
