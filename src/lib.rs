//! Voice document assistant.
//!
//! Ask typed or spoken questions about an uploaded document and hear the
//! answers.  The crate coordinates three asynchronous subsystems (voice
//! capture, voice playback and the remote question-answering service)
//! around one shared [`session::Session`].

pub mod app;
pub mod assistant;
pub mod config;
pub mod notify;
pub mod service;
pub mod session;
pub mod speech;
