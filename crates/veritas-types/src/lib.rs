//! Core types and structures for veritas
//!
//! This crate provides the conversation model shared by the session manager,
//! the backend client and the web server, plus the JSON shapes exchanged with
//! the language-model backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Sampling temperature sent with every prompt unless configured otherwise
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Error text used when the backend rejects a request without saying why
pub const GENERIC_BACKEND_ERROR: &str = "Failed to get response";

/// Error text returned by the relay endpoint when it cannot complete a call
pub const RELAY_FAILURE_ERROR: &str = "Failed to process request";

// ============================================================================
// Conversation Types
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single entry in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh identifier stamped with the current time
    pub fn new(content: impl Into<String>, role: Role) -> Self {
        Self::with_timestamp(content, role, Utc::now())
    }

    pub fn with_timestamp(content: impl Into<String>, role: Role, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp,
        }
    }
}

/// Observable state of one chat session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

// ============================================================================
// Backend Wire Types
// ============================================================================

/// Body of a `POST /generate/` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_output_tokens: Option<u32>,
}

impl PromptRequest {
    /// Request for `prompt` with the default temperature and nothing else set
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_output_tokens: None,
        }
    }
}

/// Successful backend reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub response: String,
    #[serde(default)]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_tokens: Option<u64>,
}

/// Backend reply accompanying a non-success status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
}
