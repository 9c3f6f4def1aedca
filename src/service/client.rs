//! Core `AssistantService` trait and `HttpAssistantService` implementation.
//!
//! `HttpAssistantService` talks to the document question-answering server:
//! `POST /query`, `POST /upload` and `POST /delete-document`, all relative to
//! [`ServerConfig::base_url`].  Requests are multipart forms, as a browser
//! `FormData` would send them.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors from the remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("server returned {status}{}", message_suffix(.message))]
    Status { status: u16, message: Option<String> },

    /// The response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl ServiceError {
    /// The server-provided error text, if the server sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ServiceError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name shown to the user and sent with the form part.
    pub name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// AssistantService trait
// ---------------------------------------------------------------------------

/// The remote question-answering and document store.
///
/// Implementors must be `Send + Sync` so they can be held as
/// `Arc<dyn AssistantService>`.
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Ask a question about the current document and return the answer.
    async fn query(&self, question: &str) -> Result<String, ServiceError>;

    /// Replace the current document.
    async fn upload(&self, file: &UploadFile) -> Result<(), ServiceError>;

    /// Remove the current document.
    async fn delete_document(&self) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpAssistantService
// ---------------------------------------------------------------------------

/// `reqwest`-based client for the assistant server.
pub struct HttpAssistantService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAssistantService {
    /// Build a client from config.
    ///
    /// The per-request timeout comes from `config.timeout_secs`; a default
    /// client is used if the builder fails.
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into [`ServiceError::Status`], keeping the
    /// server's `{ "error": ... }` message when there is one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
}

#[async_trait]
impl AssistantService for HttpAssistantService {
    async fn query(&self, question: &str) -> Result<String, ServiceError> {
        let form = reqwest::multipart::Form::new().text("query", question.to_string());

        log::debug!("service: POST /query ({} chars)", question.len());
        let response = self.client.post(self.url("query")).multipart(form).send().await?;
        let response = Self::check(response).await?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(body.response)
    }

    async fn upload(&self, file: &UploadFile) -> Result<(), ServiceError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| ServiceError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        log::debug!(
            "service: POST /upload {} ({}, {} bytes)",
            file.name,
            file.media_type,
            file.bytes.len()
        );
        let response = self.client.post(self.url("upload")).multipart(form).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_document(&self) -> Result<(), ServiceError> {
        log::debug!("service: POST /delete-document");
        let response = self.client.post(self.url("delete-document")).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
