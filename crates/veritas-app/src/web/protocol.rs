use serde::{Deserialize, Serialize};

use veritas_chat::SendOutcome;
use veritas_types::SessionState;

/// Session ID type
pub type SessionId = uuid::Uuid;

/// Optional per-session overrides of the server's generation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Body of `POST /api/sessions/:id/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Reply to a send: how it went and the state afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub outcome: String,
    pub state: SessionState,
}

pub fn outcome_label(outcome: SendOutcome) -> &'static str {
    match outcome {
        SendOutcome::Completed => "completed",
        SendOutcome::Failed => "failed",
        SendOutcome::Rejected => "rejected",
        SendOutcome::Discarded => "discarded",
    }
}

/// Messages sent from client to server over the WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    SendPrompt { content: String },
    Reset,
}

/// Messages sent from server to client over the WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Full session state, pushed on connect and after every change
    State(SessionState),
    /// A send was refused because another one is in flight
    SendRejected { content: String },
    Error { message: String },
}

/// Session information for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub created_at: String,
    pub last_activity: String,
    pub active_clients: usize,
    pub message_count: usize,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
