use axum::{
    body::Bytes,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::web::{
    protocol::{
        outcome_label, ClientMessage, SendMessageRequest, SendMessageResponse, ServerMessage,
        SessionConfig, SessionId, SessionInfo,
    },
    session_manager::{Session, SessionManager},
};
use veritas_chat::SendOutcome;
use veritas_types::{SessionState, RELAY_FAILURE_ERROR};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Relay to the prompt backend
        .route("/api/chat", post(relay_chat))
        // Server-held sessions
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/:id",
            get(get_session_state).delete(close_session),
        )
        .route("/api/sessions/:id/info", get(get_session_info))
        .route(
            "/api/sessions/:id/messages",
            post(send_message).delete(reset_session),
        )
        // WebSocket endpoint
        .route("/ws/:session_id", get(websocket_handler))
        .with_state(state)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/chat - pass the request through to the backend.
///
/// The backend's status and body come back unchanged; any failure on the
/// way yields a fixed 500 body.
async fn relay_chat(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("relay: unreadable request body: {}", e);
            return relay_failure();
        }
    };

    match state.session_manager.backend().relay(&payload).await {
        Ok((status, data)) => {
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(data)).into_response()
        }
        Err(e) => {
            tracing::error!("relay: backend call failed: {}", e);
            relay_failure()
        }
    }
}

fn relay_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": RELAY_FAILURE_ERROR })),
    )
        .into_response()
}

/// GET /api/sessions - List all active sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.session_manager.list_sessions().await;
    Json(serde_json::json!({ "sessions": sessions }))
}

/// POST /api/sessions - Create a new session
async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    // An empty body means "server defaults"
    let config: SessionConfig = if body.iter().all(u8::is_ascii_whitespace) {
        SessionConfig::default()
    } else {
        serde_json::from_slice(&body)?
    };
    if let Some(temperature) = config.temperature {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AppError::BadRequest(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                temperature
            )));
        }
    }

    let session = state.session_manager.create_session(config).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session.id,
            "created_at": session.created_at.to_rfc3339(),
            "websocket_url": format!("/ws/{}", session.id),
        })),
    ))
}

/// GET /api/sessions/:id - Current session state
async fn get_session_state(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionState>, AppError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(session.chat.state()))
}

/// GET /api/sessions/:id/info - Session metadata
async fn get_session_info(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionInfo>, AppError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(session.get_info().await))
}

/// DELETE /api/sessions/:id - Close a session
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.session_manager.remove_session(&id).await {
        return Err(AppError::NotFound("Session not found".into()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Session closed successfully",
    })))
}

/// POST /api/sessions/:id/messages - Send a prompt and wait for the outcome
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let session = find_session(&state, &id).await?;

    let content = request.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message content must not be empty".into()));
    }
    session.update_activity().await;

    // The send outlives this request if the client hangs up
    let outcome = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.chat.send_prompt(&content).await }
    })
    .await
    .map_err(|e| AppError::Anyhow(anyhow::anyhow!("send task failed: {}", e)))?;
    if outcome == SendOutcome::Rejected {
        return Err(AppError::Conflict(
            "A prompt is already being processed for this session".into(),
        ));
    }

    Ok(Json(SendMessageResponse {
        outcome: outcome_label(outcome).to_string(),
        state: session.chat.state(),
    }))
}

/// DELETE /api/sessions/:id/messages - Clear the conversation
async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionState>, AppError> {
    let session = find_session(&state, &id).await?;
    session.chat.reset().await;
    session.update_activity().await;
    Ok(Json(session.chat.state()))
}

async fn find_session(state: &AppState, id: &SessionId) -> Result<Arc<Session>, AppError> {
    state
        .session_manager
        .get_session(id)
        .await
        .ok_or_else(|| AppError::NotFound("Session not found".into()))
}

/// GET /ws/:session_id - WebSocket endpoint
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Response {
    match state.session_manager.get_session(&session_id).await {
        Some(session) => ws.on_upgrade(move |socket| handle_websocket(socket, session)),
        None => AppError::NotFound("Session not found".into()).into_response(),
    }
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, session: Arc<Session>) {
    session.client_connected().await;
    tracing::debug!(session_id = %session.id, "websocket client connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Push every state change; the current state goes out first
    let mut state_rx = session.chat.subscribe();
    let state_tx = tx.clone();
    let watch_task = tokio::spawn(async move {
        loop {
            let snapshot = state_rx.borrow_and_update().clone();
            if state_tx.send(ServerMessage::State(snapshot)).is_err() {
                break;
            }
            if state_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sink.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("failed to encode server message: {}", e),
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            WsMessage::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(client_msg, &session, &tx).await,
                Err(e) => {
                    tracing::warn!("failed to parse websocket message: {}", e);
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Invalid message: {}", e),
                    });
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    watch_task.abort();
    send_task.abort();
    session.client_disconnected().await;
    tracing::debug!(session_id = %session.id, "websocket client disconnected");
}

/// Handle a message from a client
async fn handle_client_message(
    message: ClientMessage,
    session: &Arc<Session>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    session.update_activity().await;

    match message {
        ClientMessage::SendPrompt { content } => {
            let content = content.trim().to_string();
            if content.is_empty() {
                let _ = tx.send(ServerMessage::Error {
                    message: "Message content must not be empty".into(),
                });
                return;
            }
            // Run the send on its own task so the reader keeps serving Reset
            let session = Arc::clone(session);
            let tx = tx.clone();
            tokio::spawn(async move {
                if session.chat.send_prompt(&content).await == SendOutcome::Rejected {
                    let _ = tx.send(ServerMessage::SendRejected { content });
                }
            });
        }
        ClientMessage::Reset => session.chat.reset().await,
    }
}

/// Error type for API handlers
#[derive(Debug)]
pub enum AppError {
    Anyhow(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    SerdeJson(serde_json::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeJson(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Anyhow(err) => {
                tracing::error!("request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::SerdeJson(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
