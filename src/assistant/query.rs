//! Query orchestrator: question → answer → history → spoken reply.
//!
//! ```text
//! submit(question)
//!   ├─ empty after trim → warning, no request
//!   └─▶ BeginQuery                                   [Processing]
//!         └─▶ service.query(question).await
//!               ├─ Ok  → record answer + history
//!               │        ├─ can speak → speak(answer) [Speaking]
//!               │        └─ otherwise → QueryAnswered [Idle]
//!               └─ Err → notify, QueryFailed         [Idle]
//! ```
//!
//! Submissions are not serialised.  Two overlapping calls each apply their
//! own result when their request resolves, so the last one to resolve wins
//! the pending answer and the history is in resolution order.

use std::sync::Arc;

use crate::notify::{Notification, Notifier};
use crate::service::AssistantService;
use crate::session::{lock, ConversationEntry, SharedSession, Transition};
use crate::speech::{PlaybackController, PlaybackOutcome, SpeechTask};

use super::AssistantError;

/// A successfully answered question.
#[derive(Debug)]
pub struct Answer {
    pub entry: ConversationEntry,
    /// The automatic spoken reply; `None` when the host cannot speak.
    pub utterance: Option<SpeechTask<PlaybackOutcome>>,
}

/// Submits questions to the [`AssistantService`].
#[derive(Clone)]
pub struct QueryOrchestrator {
    session: SharedSession,
    service: Arc<dyn AssistantService>,
    playback: PlaybackController,
    notifier: Arc<dyn Notifier>,
}

impl QueryOrchestrator {
    pub fn new(
        session: SharedSession,
        service: Arc<dyn AssistantService>,
        playback: PlaybackController,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            service,
            playback,
            notifier,
        }
    }

    /// Ask `question`.
    ///
    /// The document-ready flag is not consulted; the server answers (or
    /// refuses) without a document.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::EmptyQuery`]: nothing but whitespace; no request.
    /// - [`AssistantError::Service`]: the request failed; not retried.
    pub async fn submit(&self, question: &str) -> Result<Answer, AssistantError> {
        if question.trim().is_empty() {
            self.notifier.notify(Notification::warning("Please enter a query"));
            return Err(AssistantError::EmptyQuery);
        }

        let _ = lock(&self.session).apply(Transition::BeginQuery);
        log::info!("query: submitting {question:?}");

        match self.service.query(question).await {
            Ok(answer) => {
                let entry = ConversationEntry::now(question, answer.clone());
                log::debug!("query: answered {question:?}");

                let recorded = entry.clone();
                let utterance = self
                    .playback
                    .speak_with(answer, |s| s.record_answer(recorded));
                if utterance.is_none() {
                    // Nothing to speak; QueryAnswered is never gated.
                    let _ = lock(&self.session).apply(Transition::QueryAnswered);
                }
                Ok(Answer { entry, utterance })
            }
            Err(e) => {
                log::error!("query: request failed: {e}");
                let _ = lock(&self.session).apply(Transition::QueryFailed);
                self.notifier
                    .notify(Notification::error("Error processing your query"));
                Err(e.into())
            }
        }
    }

    /// Replay the last answer.  `None` when there is nothing to replay or no
    /// synthesizer.
    pub fn speak_again(&self) -> Option<SpeechTask<PlaybackOutcome>> {
        let pending = lock(&self.session).pending_response().map(str::to_string)?;
        self.playback.speak(pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
