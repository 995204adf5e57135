use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::options::{SendOutcome, SessionOptions};
use veritas_llm_api::PromptBackend;
use veritas_logging::ConversationLogger;
use veritas_types::{Message, Role, SessionState, GENERIC_BACKEND_ERROR};

/// Error recorded when a send is abandoned before its reply arrives
pub const SEND_CANCELLED_ERROR: &str = "Request cancelled before a reply arrived";

/// One conversation with the prompt backend.
///
/// The session is the only writer of its state. At most one send is in
/// flight at a time: the loading flag is claimed atomically and a second
/// send while it is set is rejected without touching the state.
pub struct ChatSession {
    backend: Arc<dyn PromptBackend>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    /// Advanced by every reset; replies for an older generation are dropped
    generation: AtomicU64,
    logger: Option<Mutex<ConversationLogger>>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn PromptBackend>, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            backend,
            options,
            state,
            generation: AtomicU64::new(0),
            logger: None,
        }
    }

    /// Mirror every message into a JSONL transcript
    pub fn with_logger(mut self, logger: ConversationLogger) -> Self {
        self.logger = Some(Mutex::new(logger));
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn message_count(&self) -> usize {
        self.state.borrow().messages.len()
    }

    /// Append a message at the tail of the conversation and return it
    pub async fn append_message(&self, content: impl Into<String>, role: Role) -> Message {
        let content = content.into();
        let mut appended = None;
        self.state.send_modify(|state| {
            appended = Some(push_message(state, content, role));
        });
        // send_modify always runs the closure
        let message = appended.unwrap_or_else(|| Message::new(String::new(), role));
        self.log_message(&message).await;
        message
    }

    /// Send a prompt and record the reply or the failure in the state.
    ///
    /// Never returns an error: failures land in `SessionState::error`.
    pub async fn send_prompt(&self, content: &str) -> SendOutcome {
        let mut user_message = None;
        let mut generation = 0;
        let accepted = self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }
            generation = self.generation.load(Ordering::SeqCst);
            user_message = Some(push_message(state, content.to_string(), Role::User));
            state.is_loading = true;
            state.error = None;
            true
        });

        if !accepted {
            tracing::warn!("send rejected: a prompt is already in flight");
            return SendOutcome::Rejected;
        }
        let mut in_flight = InFlight {
            session: self,
            generation,
            armed: true,
        };
        if let Some(message) = &user_message {
            self.log_message(message).await;
        }

        let request = self.options.build_request(content);
        tracing::info!(
            backend = %self.backend.describe(),
            prompt_chars = content.chars().count(),
            "sending prompt"
        );
        let result = self.backend.forward(&request).await;
        in_flight.armed = false;

        let mut outcome = SendOutcome::Discarded;
        let mut assistant_message = None;
        let mut recorded_error = None;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            match &result {
                Ok(reply) => {
                    assistant_message = Some(push_message(state, reply.response.clone(), Role::Assistant));
                    outcome = SendOutcome::Completed;
                }
                Err(err) => {
                    let text = err.to_string();
                    let text = if text.trim().is_empty() {
                        GENERIC_BACKEND_ERROR.to_string()
                    } else {
                        text
                    };
                    state.error = Some(text.clone());
                    recorded_error = Some(text);
                    outcome = SendOutcome::Failed;
                }
            }
            state.is_loading = false;
            true
        });

        match outcome {
            SendOutcome::Completed => {
                if let Some(message) = &assistant_message {
                    let model = result.as_ref().ok().map(|reply| reply.model.as_str());
                    self.log_message_with_model(message, model).await;
                }
            }
            SendOutcome::Failed => {
                if let Some(error) = &recorded_error {
                    tracing::warn!("prompt failed: {}", error);
                    if let Some(logger) = &self.logger {
                        logger.lock().await.log_error(error).await;
                    }
                }
            }
            _ => tracing::debug!("session reset while waiting, reply dropped"),
        }

        outcome
    }

    /// Drop the whole conversation and return to idle
    pub async fn reset(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::default();
        });
        tracing::debug!("session reset");
        if let Some(logger) = &self.logger {
            logger.lock().await.log_reset().await;
        }
    }

    /// Flush the transcript, if any
    pub async fn shutdown(&self) {
        if let Some(logger) = &self.logger {
            logger.lock().await.shutdown().await;
        }
    }

    async fn log_message(&self, message: &Message) {
        self.log_message_with_model(message, None).await;
    }

    async fn log_message_with_model(&self, message: &Message, model: Option<&str>) {
        if let Some(logger) = &self.logger {
            logger.lock().await.log_message(message, model).await;
        }
    }
}

/// Returns the session to idle if a send is dropped while waiting on the backend
struct InFlight<'a> {
    session: &'a ChatSession,
    generation: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let session = self.session;
        let generation = self.generation;
        let cleared = session.state.send_if_modified(|state| {
            if session.generation.load(Ordering::SeqCst) != generation || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            state.error = Some(SEND_CANCELLED_ERROR.to_string());
            true
        });
        if cleared {
            tracing::warn!("send cancelled before the backend replied");
        }
    }
}

/// Append to the tail, keeping timestamps non-decreasing even if the clock steps back
fn push_message(state: &mut SessionState, content: String, role: Role) -> Message {
    let now = Utc::now();
    let timestamp = match state.messages.last() {
        Some(last) if last.timestamp > now => last.timestamp,
        _ => now,
    };
    let message = Message::with_timestamp(content, role, timestamp);
    state.messages.push(message.clone());
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use tokio::sync::Semaphore;
    use veritas_llm_api::BackendError;
    use veritas_types::{PromptRequest, PromptResponse};

    /// Backend replaying canned results, optionally held until released
    struct ScriptedBackend {
        replies: std::sync::Mutex<VecDeque<Result<PromptResponse, BackendError>>>,
        requests: std::sync::Mutex<Vec<PromptRequest>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<PromptResponse, BackendError>>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.into()),
                requests: std::sync::Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(replies: Vec<Result<PromptResponse, BackendError>>, gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(replies)
            }
        }

        fn requests(&self) -> Vec<PromptRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PromptBackend for ScriptedBackend {
        async fn forward(&self, request: &PromptRequest) -> Result<PromptResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")
        }
    }

    fn reply(text: &str) -> Result<PromptResponse, BackendError> {
        Ok(PromptResponse {
            response: text.to_string(),
            model: "x".to_string(),
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
        })
    }

    fn status_error(status: u16, message: &str) -> Result<PromptResponse, BackendError> {
        Err(BackendError::Status {
            status,
            message: message.to_string(),
        })
    }

    fn decode_error() -> Result<PromptResponse, BackendError> {
        Err(BackendError::Decode(
            serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        ))
    }

    fn session_with(backend: Arc<ScriptedBackend>) -> ChatSession {
        ChatSession::new(backend, SessionOptions::default())
    }

    fn contents(state: &SessionState) -> Vec<(Role, String)> {
        state
            .messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_successful_send_appends_user_then_assistant() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("Hi there")]));
        let session = session_with(backend.clone());

        let outcome = session.send_prompt("Hello").await;

        assert_eq!(outcome, SendOutcome::Completed);
        let state = session.state();
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "Hi there".to_string()),
            ]
        );
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_request_uses_default_temperature() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("ok")]));
        let session = session_with(backend.clone());

        session.send_prompt("Hello").await;

        assert_eq!(backend.requests(), vec![PromptRequest::new("Hello")]);
    }

    #[tokio::test]
    async fn test_request_carries_session_options() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("ok")]));
        let options = SessionOptions {
            model: Some("gemini-1.5-pro".to_string()),
            temperature: 0.2,
            max_output_tokens: Some(128),
        };
        let session = ChatSession::new(backend.clone(), options);

        session.send_prompt("Hello").await;

        let sent = &backend.requests()[0];
        assert_eq!(sent.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(sent.temperature, Some(0.2));
        assert_eq!(sent.max_output_tokens, Some(128));
    }

    #[tokio::test]
    async fn test_repeated_sends_grow_by_two_in_order() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("one"), reply("two"), reply("three")]));
        let session = session_with(backend);

        for prompt in ["a", "b", "c"] {
            session.send_prompt(prompt).await;
        }

        let state = session.state();
        assert_eq!(state.messages.len(), 6);
        for pair in state.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
        assert_eq!(state.messages[4].content, "c");
        assert_eq!(state.messages[5].content, "three");
        assert!(state
            .messages
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_backend_error_keeps_user_message_and_records_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![status_error(429, "rate limited")]));
        let session = session_with(backend);

        let outcome = session.send_prompt("Hello").await;

        assert_eq!(outcome, SendOutcome::Failed);
        let state = session.state();
        assert_eq!(contents(&state), vec![(Role::User, "Hello".to_string())]);
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("rate limited"));
    }

    #[tokio::test]
    async fn test_malformed_reply_records_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![decode_error()]));
        let session = session_with(backend);

        session.send_prompt("Hello").await;

        let state = session.state();
        assert_eq!(state.messages.len(), 1);
        assert!(state.error.is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_error_text_falls_back_to_generic() {
        let backend = Arc::new(ScriptedBackend::new(vec![status_error(500, "")]));
        let session = session_with(backend);

        session.send_prompt("Hello").await;

        assert_eq!(session.state().error.as_deref(), Some(GENERIC_BACKEND_ERROR));
    }

    #[tokio::test]
    async fn test_next_send_clears_previous_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![status_error(503, "busy"), reply("back")]));
        let session = session_with(backend);

        session.send_prompt("first").await;
        assert!(session.state().error.is_some());

        session.send_prompt("second").await;
        let state = session.state();
        assert_eq!(state.error, None);
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "first".to_string()),
                (Role::User, "second".to_string()),
                (Role::Assistant, "back".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_returns_to_empty_idle_state() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("ok"), status_error(500, "boom")]));
        let session = session_with(backend);

        session.send_prompt("a").await;
        session.send_prompt("b").await;
        session.reset().await;

        assert_eq!(session.state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_append_message_returns_the_stored_message() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let session = session_with(backend);

        let first = session.append_message("note", Role::User).await;
        let second = session.append_message("answer", Role::Assistant).await;

        let state = session.state();
        assert_eq!(state.messages, vec![first.clone(), second]);
        assert_ne!(first.id, state.messages[1].id);
    }

    #[tokio::test]
    async fn test_overlapping_send_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend::gated(vec![reply("first reply")], gate.clone()));
        let session = Arc::new(session_with(backend.clone()));

        let mut rx = session.subscribe();
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.send_prompt("first").await }
        });
        rx.wait_for(|state| state.is_loading).await.unwrap();

        let second = session.send_prompt("second").await;
        assert_eq!(second, SendOutcome::Rejected);
        assert_eq!(session.message_count(), 1);

        gate.add_permits(1);
        assert_eq!(in_flight.await.unwrap(), SendOutcome::Completed);

        let state = session.state();
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "first reply".to_string()),
            ]
        );
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_during_send_discards_late_reply() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend::gated(vec![reply("too late")], gate.clone()));
        let session = Arc::new(session_with(backend));

        let mut rx = session.subscribe();
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.send_prompt("Hello").await }
        });
        rx.wait_for(|state| state.is_loading).await.unwrap();

        session.reset().await;
        gate.add_permits(1);

        assert_eq!(in_flight.await.unwrap(), SendOutcome::Discarded);
        assert_eq!(session.state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_cancelled_send_returns_session_to_idle() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend::gated(vec![reply("second reply")], gate.clone()));
        let session = Arc::new(session_with(backend.clone()));

        let mut rx = session.subscribe();
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.send_prompt("first").await }
        });
        rx.wait_for(|state| state.is_loading).await.unwrap();

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());

        let state = session.state();
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some(SEND_CANCELLED_ERROR));
        assert_eq!(contents(&state), vec![(Role::User, "first".to_string())]);

        gate.add_permits(1);
        assert_eq!(session.send_prompt("second").await, SendOutcome::Completed);

        let state = session.state();
        assert_eq!(state.error, None);
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "first".to_string()),
                (Role::User, "second".to_string()),
                (Role::Assistant, "second reply".to_string()),
            ]
        );
        assert_eq!(backend.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_send_after_reset_leaves_fresh_state() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend::gated(vec![], gate));
        let session = Arc::new(session_with(backend));

        let mut rx = session.subscribe();
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.send_prompt("Hello").await }
        });
        rx.wait_for(|state| state.is_loading).await.unwrap();

        session.reset().await;
        in_flight.abort();
        let _ = in_flight.await;

        assert_eq!(session.state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_idle() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend::gated(vec![reply("Hi")], gate.clone()));
        let session = Arc::new(session_with(backend));

        let mut rx = session.subscribe();
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.send_prompt("Hello").await }
        });

        let loading = rx.wait_for(|state| state.is_loading).await.unwrap().clone();
        assert_eq!(loading.messages.len(), 1);
        assert_eq!(loading.error, None);

        gate.add_permits(1);
        let done = rx.wait_for(|state| !state.is_loading).await.unwrap().clone();
        assert_eq!(done.messages.len(), 2);
        in_flight.await.unwrap();
    }

    #[tokio::test]
    async fn test_transcript_records_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ConversationLogger::new(dir.path()).await.unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![reply("Hi there"), status_error(429, "rate limited")]));
        let session = session_with(backend).with_logger(logger);

        session.send_prompt("Hello").await;
        session.send_prompt("Again").await;
        session.shutdown().await;

        let path = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let roles: Vec<String> = std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                let entry: serde_json::Value = serde_json::from_str(line).unwrap();
                entry["role"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "error"]);
    }
}
