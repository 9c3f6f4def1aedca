//! Document lifecycle: upload, delete and the "document ready" flag.

use std::path::Path;
use std::sync::Arc;

use crate::notify::{Notification, Notifier};
use crate::service::{AssistantService, ServiceError, UploadFile};
use crate::session::{lock, SharedSession};

use super::AssistantError;

/// Media types the server can index: PDF, DOC, DOCX and plain text.
pub const SUPPORTED_MEDIA_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Whether `media_type` is one the server accepts.
///
/// ```
/// use voice_doc_assistant::assistant::is_supported_media_type;
///
/// assert!(is_supported_media_type("application/pdf"));
/// assert!(!is_supported_media_type("image/png"));
/// ```
pub fn is_supported_media_type(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&media_type)
}

/// The media type a file declares through its extension.
///
/// Unknown extensions declare `application/octet-stream`.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "text" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "rtf" => "application/rtf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

impl UploadFile {
    /// Read a local file, declaring its media type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, AssistantError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AssistantError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            media_type: media_type_for(path).to_string(),
            bytes,
        })
    }
}

/// Uploads and deletes the document the questions are asked against.
#[derive(Clone)]
pub struct DocumentManager {
    session: SharedSession,
    service: Arc<dyn AssistantService>,
    notifier: Arc<dyn Notifier>,
}

impl DocumentManager {
    pub fn new(
        session: SharedSession,
        service: Arc<dyn AssistantService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            service,
            notifier,
        }
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.session).document_ready()
    }

    /// Upload `file` after checking its declared type.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::UnsupportedMediaType`]: no request is made.
    /// - [`AssistantError::Service`]: the flag is left unchanged.
    pub async fn upload(&self, file: &UploadFile) -> Result<(), AssistantError> {
        if !is_supported_media_type(&file.media_type) {
            log::warn!("document: rejected {} ({})", file.name, file.media_type);
            self.notifier.notify(Notification::error(
                "Unsupported file format. Please upload PDF, DOC, DOCX, or TXT.",
            ));
            return Err(AssistantError::UnsupportedMediaType(file.media_type.clone()));
        }

        match self.service.upload(file).await {
            Ok(()) => {
                lock(&self.session).mark_document_ready();
                log::info!("document: uploaded {}", file.name);
                self.notifier.notify(
                    Notification::success("Document Uploaded Successfully")
                        .with_description(format!("{} has been processed.", file.name)),
                );
                Ok(())
            }
            Err(e) => {
                log::error!("document: upload of {} failed: {e}", file.name);
                let notification = match e.server_message() {
                    Some(message) => {
                        Notification::error("Upload Failed").with_description(message)
                    }
                    None if is_server_response(&e) => Notification::error("Upload Failed")
                        .with_description("Error processing document"),
                    None => Notification::error("Upload Error")
                        .with_description("Failed to upload document"),
                };
                self.notifier.notify(notification);
                Err(e.into())
            }
        }
    }

    /// Delete the document.  The caller is responsible for confirming with
    /// the user first.
    ///
    /// On success the flag, the pending answer and the conversation history
    /// are cleared; on failure nothing changes.
    pub async fn delete(&self) -> Result<(), AssistantError> {
        match self.service.delete_document().await {
            Ok(()) => {
                lock(&self.session).reset_document();
                log::info!("document: deleted");
                self.notifier
                    .notify(Notification::success("Document deleted successfully"));
                Ok(())
            }
            Err(e) => {
                log::error!("document: delete failed: {e}");
                let title = if is_server_response(&e) {
                    "Failed to delete document"
                } else {
                    "Error deleting document"
                };
                self.notifier.notify(Notification::error(title));
                Err(e.into())
            }
        }
    }
}

/// The server answered, as opposed to the request never completing.
fn is_server_response(e: &ServiceError) -> bool {
    matches!(e, ServiceError::Status { .. })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
