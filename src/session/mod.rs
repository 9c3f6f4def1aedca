//! Shared session state for the assistant.
//!
//! [`Session`] is the single source of truth read by the terminal surface and
//! mutated by the capture, playback, query and document controllers.  All
//! mode changes go through [`Session::apply`].

pub mod history;
pub mod state;

pub use history::{ConversationEntry, ConversationHistory};
pub use state::{
    lock, new_shared_session, InteractionState, Session, SharedSession, Transition,
    TransitionError,
};
