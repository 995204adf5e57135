use async_trait::async_trait;
use thiserror::Error;

use veritas_types::{PromptRequest, PromptResponse};

pub mod http;
pub use http::HttpBackend;

/// Failure of a single backend call.
///
/// `Display` is the human-readable text shown to the user, so a structured
/// backend error renders as exactly the backend's own message.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend answered with a non-success status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never produced a readable response
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON shape
    #[error("Malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// HTTP status reported by the backend, if it got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(err) => err.status().map(|s| s.as_u16()),
            BackendError::Decode(_) => None,
        }
    }
}

/// Prompt backend - the one call the chat session depends on
#[async_trait]
pub trait PromptBackend: Send + Sync {
    /// Send one prompt and wait for the reply. Exactly one attempt, no retry.
    async fn forward(&self, request: &PromptRequest) -> Result<PromptResponse, BackendError>;

    /// Human-readable description of where prompts go
    fn describe(&self) -> String {
        "prompt backend".to_string()
    }
}
