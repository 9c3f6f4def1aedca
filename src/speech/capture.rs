//! Voice input controller.
//!
//! Wraps a single-shot [`Recognizer`].  Starting while already listening is
//! a stop request, so the voice control behaves as a toggle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::AbortHandle;

use crate::notify::{Notification, Notifier};
use crate::session::{lock, InteractionState, SharedSession, Transition};

use super::{Recognizer, RecognitionResult, SpeechError, SpeechTask};

/// How a capture session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The first alternative of the first result, now in the input line.
    Transcribed(String),
    /// The recognizer reported an error code.
    Failed(String),
    /// The session was stopped before its result could be applied.
    Cancelled,
}

/// Result of [`CaptureController::start_capture`].
#[derive(Debug)]
pub enum CaptureStart {
    /// A new session is running.
    Started(SpeechTask<CaptureOutcome>),
    /// A session was already running and has been stopped instead.
    Stopped,
}

struct ActiveCapture {
    id: u64,
    abort: AbortHandle,
}

/// Starts, stops and completes voice capture sessions.
#[derive(Clone)]
pub struct CaptureController {
    session: SharedSession,
    recognizer: Option<Arc<dyn Recognizer>>,
    notifier: Arc<dyn Notifier>,
    locale: String,
    active: Arc<Mutex<Option<ActiveCapture>>>,
    next_id: Arc<AtomicU64>,
}

impl CaptureController {
    /// `recognizer` is `None` when the host has no voice input.
    pub fn new(
        session: SharedSession,
        recognizer: Option<Arc<dyn Recognizer>>,
        notifier: Arc<dyn Notifier>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            session,
            recognizer,
            notifier,
            locale: locale.into(),
            active: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Begin a capture session, or stop the running one.
    ///
    /// # Errors
    ///
    /// - [`SpeechError::Unavailable`] when the host has no recognizer.
    /// - [`SpeechError::Busy`] when the assistant is processing or speaking.
    pub fn start_capture(&self) -> Result<CaptureStart, SpeechError> {
        let Some(recognizer) = self.recognizer.clone() else {
            self.notifier
                .notify(Notification::error("Voice input is not supported on this host"));
            return Err(SpeechError::Unavailable("voice input"));
        };

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = lock(&self.session);

        if active.is_some() || session.mode() == InteractionState::Listening {
            drop(session);
            Self::cancel(&mut active, &self.session);
            return Ok(CaptureStart::Stopped);
        }

        if let Err(e) = session.apply(Transition::StartListening) {
            log::debug!("capture: rejected start: {e}");
            let err = SpeechError::Busy(e.from);
            self.notifier.notify(Notification::warning(err.to_string()));
            return Err(err);
        }
        drop(session);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("capture: session {id} started ({})", self.locale);
        self.notifier.notify(Notification::info(
            "Listening... Speak clearly in a quiet environment",
        ));

        let locale = self.locale.clone();
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let result = recognizer.recognize(&locale).await;
            controller.finish(id, result)
        });

        *active = Some(ActiveCapture {
            id,
            abort: handle.abort_handle(),
        });
        Ok(CaptureStart::Started(SpeechTask::new(id, handle)))
    }

    /// Cancel the running session, if any.  Returns whether one was running.
    pub fn stop_capture(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let was_active = active.is_some();
        Self::cancel(&mut active, &self.session);
        was_active
    }

    fn cancel(active: &mut Option<ActiveCapture>, session: &SharedSession) {
        if let Some(capture) = active.take() {
            capture.abort.abort();
            log::debug!("capture: session {} stopped", capture.id);
        }
        let _ = lock(session).apply(Transition::StopListening);
    }

    /// Apply a finished recognition to the session.
    fn finish(
        &self,
        id: u64,
        result: Result<Vec<RecognitionResult>, SpeechError>,
    ) -> CaptureOutcome {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.as_ref().is_some_and(|a| a.id == id) {
            log::debug!("capture: dropping result of stopped session {id}");
            return CaptureOutcome::Cancelled;
        }
        *active = None;

        let outcome = match result.and_then(first_transcript) {
            Ok(transcript) => {
                log::debug!("capture: session {id} heard {transcript:?}");
                lock(&self.session).set_query_text(transcript.clone());
                CaptureOutcome::Transcribed(transcript)
            }
            Err(e) => {
                let code = match e {
                    SpeechError::Runtime(code) => code,
                    other => other.to_string(),
                };
                log::warn!("capture: session {id} failed: {code}");
                self.notifier
                    .notify(Notification::error(format!("Voice input error: {code}")));
                CaptureOutcome::Failed(code)
            }
        };

        let _ = lock(&self.session).apply(Transition::StopListening);
        outcome
    }
}

/// Exactly the first alternative of the first result.
fn first_transcript(results: Vec<RecognitionResult>) -> Result<String, SpeechError> {
    results
        .into_iter()
        .next()
        .and_then(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .ok_or_else(|| SpeechError::Runtime("no-speech".into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
