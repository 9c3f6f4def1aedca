//! Spoken answer controller.
//!
//! At most one utterance is active: [`PlaybackController::speak`] cancels the
//! current one before starting the next.  Whenever an utterance ends, on
//! success or error, the input line is cleared so the user starts fresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::AbortHandle;

use crate::notify::{Notification, Notifier};
use crate::session::{lock, Session, SharedSession, Transition};

use super::{SpeechError, SpeechTask, Synthesizer};

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
}

struct ActiveUtterance {
    id: u64,
    abort: AbortHandle,
}

/// Speaks text through the host [`Synthesizer`].
#[derive(Clone)]
pub struct PlaybackController {
    session: SharedSession,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    notifier: Arc<dyn Notifier>,
    active: Arc<Mutex<Option<ActiveUtterance>>>,
    next_id: Arc<AtomicU64>,
}

impl PlaybackController {
    /// `synthesizer` is `None` when the host cannot speak.
    pub fn new(
        session: SharedSession,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            synthesizer,
            notifier,
            active: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start speaking `text`, cancelling any active utterance first.
    ///
    /// Returns `None` without touching the session when the host has no
    /// synthesizer.
    pub fn speak(&self, text: impl Into<String>) -> Option<SpeechTask<PlaybackOutcome>> {
        if !self.is_available() {
            log::debug!("playback: no synthesizer, not speaking");
            return None;
        }
        self.speak_with(text, |_| {})
    }

    /// Like [`speak`](Self::speak), but runs `update` on the session in the
    /// same critical section that enters `Speaking`.
    ///
    /// Without a synthesizer `update` still runs and `None` is returned.
    pub fn speak_with(
        &self,
        text: impl Into<String>,
        update: impl FnOnce(&mut Session),
    ) -> Option<SpeechTask<PlaybackOutcome>> {
        let Some(synthesizer) = self.synthesizer.clone() else {
            update(&mut lock(&self.session));
            return None;
        };
        let text = text.into();

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.abort.abort();
            log::debug!("playback: utterance {} cancelled by a new one", previous.id);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut session = lock(&self.session);
            update(&mut session);
            // StartSpeaking is never gated.
            let _ = session.apply(Transition::StartSpeaking);
        }
        log::debug!("playback: utterance {id} started ({} chars)", text.len());

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let result = synthesizer.speak(&text).await;
            controller.finish(id, result)
        });

        *active = Some(ActiveUtterance {
            id,
            abort: handle.abort_handle(),
        });
        Some(SpeechTask::new(id, handle))
    }

    /// Cancel the active utterance.  Returns whether one was active.
    ///
    /// Stopping also clears the input line.
    pub fn stop(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(utterance) = active.take() else {
            return false;
        };
        utterance.abort.abort();
        log::debug!("playback: utterance {} stopped", utterance.id);

        let mut session = lock(&self.session);
        session.clear_query_text();
        let _ = session.apply(Transition::StopSpeaking);
        true
    }

    fn finish(&self, id: u64, result: Result<(), SpeechError>) -> PlaybackOutcome {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
            let mut session = lock(&self.session);
            session.clear_query_text();
            let _ = session.apply(Transition::StopSpeaking);
        }

        match result {
            Ok(()) => {
                log::debug!("playback: utterance {id} finished");
                PlaybackOutcome::Finished
            }
            Err(e) => {
                log::warn!("playback: utterance {id} failed: {e}");
                self.notifier
                    .notify(Notification::warning(format!("Playback error: {e}")));
                PlaybackOutcome::Failed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
