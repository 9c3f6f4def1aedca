//! Errors surfaced by the assistant operations.

use thiserror::Error;

use crate::service::ServiceError;
use crate::speech::SpeechError;

/// Why a user action did not complete.
///
/// Every variant is terminal for the action that produced it; none is
/// retried internally.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The question was empty after trimming.
    #[error("query is empty")]
    EmptyQuery,

    /// The file's declared media type is not one the server indexes.
    #[error("unsupported file type: {0}")]
    UnsupportedMediaType(String),

    /// The local file could not be read.
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote service failed or refused the request.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A speech capability was missing or failed.
    #[error(transparent)]
    Speech(#[from] SpeechError),
}
