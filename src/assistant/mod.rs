//! User-level assistant operations.
//!
//! * [`QueryOrchestrator`]: ask a question, record and speak the answer.
//! * [`DocumentManager`]: upload / delete the document, "document ready".
//! * [`AssistantError`]: why an action failed.
//!
//! Both orchestrators share the [`SharedSession`](crate::session::SharedSession)
//! with the speech controllers and report failures through a
//! [`Notifier`](crate::notify::Notifier).

pub mod document;
pub mod error;
pub mod query;

pub use document::{is_supported_media_type, media_type_for, DocumentManager, SUPPORTED_MEDIA_TYPES};
pub use error::AssistantError;
pub use query::{Answer, QueryOrchestrator};
