use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::app::create_chat_session;
use crate::config::ClientConfig;
use crate::web::protocol::{SessionConfig, SessionInfo};
use veritas_chat::{ChatSession, SessionOptions};
use veritas_llm_api::HttpBackend;

pub use crate::web::protocol::SessionId;

/// A chat session held by the server for browser clients
pub struct Session {
    pub id: SessionId,
    pub chat: ChatSession,
    pub created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
    clients: AtomicUsize,
}

impl Session {
    pub fn new(id: SessionId, chat: ChatSession) -> Self {
        Self {
            id,
            chat,
            created_at: Utc::now(),
            last_activity: Mutex::new(Utc::now()),
            clients: AtomicUsize::new(0),
        }
    }

    pub async fn update_activity(&self) {
        *self.last_activity.lock().await = Utc::now();
    }

    pub async fn client_connected(&self) {
        self.clients.fetch_add(1, Ordering::SeqCst);
        self.update_activity().await;
    }

    pub async fn client_disconnected(&self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
        self.update_activity().await;
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    pub async fn get_info(&self) -> SessionInfo {
        let state = self.chat.state();
        let last_activity = *self.last_activity.lock().await;

        SessionInfo {
            id: self.id,
            created_at: self.created_at.to_rfc3339(),
            last_activity: last_activity.to_rfc3339(),
            active_clients: self.client_count(),
            message_count: state.messages.len(),
            is_loading: state.is_loading,
            model: self.chat.options().model.clone(),
        }
    }
}

/// Manages all active sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    backend: Arc<HttpBackend>,
    client_config: ClientConfig,
}

impl SessionManager {
    pub fn new(client_config: ClientConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(&client_config.backend_config()));
        Self::with_backend(client_config, backend)
    }

    pub fn with_backend(client_config: ClientConfig, backend: Arc<HttpBackend>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backend,
            client_config,
        }
    }

    /// Backend shared by all sessions and the relay endpoint
    pub fn backend(&self) -> &Arc<HttpBackend> {
        &self.backend
    }

    /// Generation settings for a new session: server defaults with the client's overrides
    pub fn session_options(&self, config: &SessionConfig) -> SessionOptions {
        let defaults = self.client_config.session_options();
        SessionOptions {
            model: config.model.clone().or(defaults.model),
            temperature: config.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: config.max_output_tokens.or(defaults.max_output_tokens),
        }
    }

    /// Create a new session
    pub async fn create_session(&self, config: SessionConfig) -> Result<Arc<Session>> {
        let options = self.session_options(&config);
        let chat = create_chat_session(&self.client_config, options, self.backend.clone()).await?;

        let session = Arc::new(Session::new(Uuid::new_v4(), chat));
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());

        tracing::info!(session_id = %session.id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.get_info().await);
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// Remove a session; returns false if it did not exist
    pub async fn remove_session(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.chat.shutdown().await;
                tracing::info!(session_id = %id, "session closed");
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
