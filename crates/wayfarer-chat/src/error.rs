//! Error types for conversational offer search.

use std::future::Future;
use std::time::Duration;

use wayfarer_core::error::WayfarerError;

/// Errors from the suggestion pipeline.
///
/// Only `InvalidRequest` is meant to reach the caller as a client error;
/// extraction and catalog failures are recovered from inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("extraction error: {0}")]
    Extraction(String),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<WayfarerError> for ChatError {
    fn from(err: WayfarerError) -> Self {
        match err {
            WayfarerError::InvalidValue { field, reason } => {
                ChatError::InvalidRequest(format!("{}: {}", field, reason))
            }
            other => ChatError::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Llm(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Extraction(err.to_string())
    }
}

/// Run `fut` to completion or fail with [`ChatError::Timeout`] after `limit`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, ChatError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout(limit.as_millis() as u64)),
    }
}
