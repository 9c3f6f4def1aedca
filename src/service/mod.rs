//! Remote question-answering / document service.
//!
//! * [`AssistantService`]: async trait the orchestrators depend on.
//! * [`HttpAssistantService`]: `reqwest` multipart client for the server.
//! * [`ServiceError`]: transport, timeout, status and parse failures.

pub mod client;

pub use client::{AssistantService, HttpAssistantService, ServiceError, UploadFile};
