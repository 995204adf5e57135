use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::client::{BackendError, PromptBackend};
use crate::config::BackendConfig;
use veritas_logging::{
    get_logs_dir, log_request, log_request_to_file, log_response, log_response_to_file,
};
use veritas_types::{ErrorResponse, PromptRequest, PromptResponse, GENERIC_BACKEND_ERROR};

/// Prompt backend reached over HTTP
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::Client,
    verbose: bool,
    log_requests: bool,
    /// Overrides `~/.veritas/logs` for request logs
    log_dir: Option<PathBuf>,
}

/// Request log written for one call, so the response can be filed next to it
struct LoggedRequest {
    dir: PathBuf,
    timestamp: i64,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            endpoint: config.endpoint_url(),
            client,
            verbose: config.verbose,
            log_requests: config.log_requests,
            log_dir: None,
        }
    }

    /// Write request logs into `dir` instead of the default logs directory
    pub fn with_request_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_requests = true;
        self.log_dir = Some(dir.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Pass a request body through to the backend untouched.
    ///
    /// Returns the backend's status and JSON body as-is, whatever the status.
    /// Only a failed round trip or a non-JSON body is an error.
    pub async fn relay(&self, body: &Value) -> Result<(StatusCode, Value), BackendError> {
        tracing::debug!(endpoint = %self.endpoint, "relaying prompt request");
        let logged = self.log_outbound(body);

        let response = self.client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        self.log_inbound(&status, &headers, &text, logged);

        let data: Value = serde_json::from_str(&text)?;
        Ok((status, data))
    }

    fn log_outbound<T: Serialize + ?Sized>(&self, body: &T) -> Option<LoggedRequest> {
        log_request(&self.endpoint, body, self.verbose);
        if !self.log_requests {
            return None;
        }

        let dir = match &self.log_dir {
            Some(dir) => dir.clone(),
            None => match get_logs_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!("no directory for request logs: {:#}", e);
                    return None;
                }
            },
        };
        match log_request_to_file(&dir, &self.endpoint, body) {
            Ok(timestamp) => Some(LoggedRequest { dir, timestamp }),
            Err(e) => {
                tracing::warn!("could not write request log: {:#}", e);
                None
            }
        }
    }

    fn log_inbound(&self, status: &StatusCode, headers: &HeaderMap, text: &str, logged: Option<LoggedRequest>) {
        log_response(status, text, self.verbose);
        if let Some(logged) = logged {
            if let Err(e) = log_response_to_file(&logged.dir, status, headers, text, logged.timestamp) {
                tracing::warn!("could not write response log: {:#}", e);
            }
        }
    }
}

#[async_trait]
impl PromptBackend for HttpBackend {
    async fn forward(&self, request: &PromptRequest) -> Result<PromptResponse, BackendError> {
        let logged = self.log_outbound(request);

        let response = self.client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, "backend unreachable: {}", e);
                BackendError::Transport(e)
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        self.log_inbound(&status, &headers, &text, logged);

        if !status.is_success() {
            let message = error_message_from_body(&text);
            tracing::warn!(status = status.as_u16(), "backend rejected prompt: {}", message);
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: PromptResponse = serde_json::from_str(&text)?;
        tracing::debug!(
            model = %reply.model,
            total_tokens = ?reply.total_tokens,
            "backend replied"
        );
        Ok(reply)
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Error text carried by a non-success body, or the generic fallback
fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|e| e.error.trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| GENERIC_BACKEND_ERROR.to_string())
}
