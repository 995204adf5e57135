use serde::{Deserialize, Serialize};

use veritas_types::{PromptRequest, DEFAULT_TEMPERATURE};

/// Generation settings copied into every request a session sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: None,
        }
    }
}

impl SessionOptions {
    pub fn build_request(&self, prompt: &str) -> PromptRequest {
        PromptRequest {
            prompt: prompt.to_string(),
            model: self.model.clone(),
            temperature: Some(self.temperature),
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// What happened to a `send_prompt` call.
///
/// Informational only: the session state is the source of truth and already
/// reflects the outcome by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Assistant reply appended
    Completed,
    /// Backend call failed, error recorded in the state
    Failed,
    /// Another send was in flight, nothing changed
    Rejected,
    /// The session was reset while waiting, the reply was dropped
    Discarded,
}
