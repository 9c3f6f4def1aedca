//! Interaction state machine and the shared session it lives in.
//!
//! [`InteractionState`] is the single "what is the assistant doing right
//! now" value.  It is only ever changed through [`Session::apply`], which is
//! where the gating rules between capture, playback and queries live.
//!
//! [`Session`] holds everything the controllers share: the mode, the text in
//! the input line, the last answer, the document-ready flag and the
//! conversation log.  [`SharedSession`] is `Arc<Mutex<Session>>`; lock it for
//! a short critical section and never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::history::{ConversationEntry, ConversationHistory};

// ---------------------------------------------------------------------------
// InteractionState
// ---------------------------------------------------------------------------

/// Modes of the assistant.
///
/// ```text
/// Idle ──StartListening──▶ Listening ──StopListening──▶ Idle
/// any  ──BeginQuery──────▶ Processing ──QueryFailed / QueryAnswered──▶ Idle
/// any  ──StartSpeaking───▶ Speaking ──StopSpeaking──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl InteractionState {
    /// A short human-readable label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Idle",
            InteractionState::Listening => "Listening...",
            InteractionState::Processing => "Processing...",
            InteractionState::Speaking => "Speaking",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Events that move the state machine.
///
/// The `Stop*`/`Query*` exit events only act when the machine is still in
/// the mode they exit; a capture that ends after a query has started must
/// not knock the machine out of `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartListening,
    StopListening,
    BeginQuery,
    QueryAnswered,
    QueryFailed,
    StartSpeaking,
    StopSpeaking,
}

/// A transition that the gating rules refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {transition:?} while {from:?}")]
pub struct TransitionError {
    pub from: InteractionState,
    pub transition: Transition,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Shared client state.
#[derive(Debug, Default)]
pub struct Session {
    mode: InteractionState,
    query_text: String,
    pending_response: Option<String>,
    document_ready: bool,
    history: ConversationHistory,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionState {
        self.mode
    }

    /// Apply `transition`, returning the new mode.
    ///
    /// Listening can only be entered from `Idle`.  Queries and playback are
    /// never rejected; playback preemption is handled by the playback
    /// controller before it dispatches `StartSpeaking`.
    pub fn apply(&mut self, transition: Transition) -> Result<InteractionState, TransitionError> {
        use InteractionState::*;
        use Transition::*;

        let next = match (self.mode, transition) {
            (Idle, StartListening) => Listening,
            (from, StartListening) => return Err(TransitionError { from, transition }),
            (Listening, StopListening) => Idle,
            (_, BeginQuery) => Processing,
            (Processing, QueryAnswered | QueryFailed) => Idle,
            (_, StartSpeaking) => Speaking,
            (Speaking, StopSpeaking) => Idle,
            (current, StopListening | QueryAnswered | QueryFailed | StopSpeaking) => current,
        };

        if next != self.mode {
            log::debug!("session: {:?} --{:?}--> {:?}", self.mode, transition, next);
        }
        self.mode = next;
        Ok(next)
    }

    // ---- QueryText ---------------------------------------------------------

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn set_query_text(&mut self, text: impl Into<String>) {
        self.query_text = text.into();
    }

    pub fn clear_query_text(&mut self) {
        self.query_text.clear();
    }

    // ---- Answers -----------------------------------------------------------

    /// Last received answer, kept for "speak again".
    pub fn pending_response(&self) -> Option<&str> {
        self.pending_response.as_deref()
    }

    /// Store a completed answer and log it.
    ///
    /// The mode is left alone: the caller either starts speaking the answer
    /// or applies `QueryAnswered`.
    pub fn record_answer(&mut self, entry: ConversationEntry) {
        self.pending_response = Some(entry.answer().to_string());
        self.history.append(entry);
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    // ---- Document ----------------------------------------------------------

    pub fn document_ready(&self) -> bool {
        self.document_ready
    }

    pub fn mark_document_ready(&mut self) {
        self.document_ready = true;
    }

    /// Forget the document together with everything answered from it.
    pub fn reset_document(&mut self) {
        self.document_ready = false;
        self.pending_response = None;
        self.history.clear();
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`Session`].  Cheap to clone.
pub type SharedSession = Arc<Mutex<Session>>;

/// Construct a new [`SharedSession`] in the `Idle` state.
pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(Session::new()))
}

/// Lock the session, recovering from a poisoned lock.
///
/// Every mutation is a short, panic-free critical section, so the data
/// behind a poisoned lock is still consistent.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
