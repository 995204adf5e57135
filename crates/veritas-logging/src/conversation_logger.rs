use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use veritas_types::Message;

#[derive(Serialize)]
struct LogEntry {
    timestamp: String, // ISO‑8601 Local time
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_error: Option<bool>,
}

/// Append-only JSONL transcript of a chat session
pub struct ConversationLogger {
    file_path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl ConversationLogger {
    /// Create a new logger under `logs_dir`; the file name is based on the current local time.
    pub async fn new(logs_dir: &Path) -> Result<Self> {
        fs::create_dir_all(logs_dir).await?;

        let now_local = Local::now();
        let filename = format!(
            "vchat-{}.jsonl",
            now_local.format("%Y-%m-%d-%H%M%S%.3f")
        );
        let file_path = logs_dir.join(filename);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await?;
        Ok(Self { file_path, file: Some(file) })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Append a conversation message.
    pub async fn log_message(&mut self, message: &Message, model: Option<&str>) {
        let entry = LogEntry {
            timestamp: message.timestamp.with_timezone(&Local).to_rfc3339(),
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            message_id: Some(message.id.clone()),
            model: model.map(|s| s.to_string()),
            is_error: None,
        };
        self.write_entry(&entry).await;
    }

    /// Append a failed exchange; these never enter the message sequence.
    pub async fn log_error(&mut self, error: &str) {
        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            role: "error".to_string(),
            content: error.to_string(),
            message_id: None,
            model: None,
            is_error: Some(true),
        };
        self.write_entry(&entry).await;
    }

    /// Mark the point where the session was cleared.
    pub async fn log_reset(&mut self) {
        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            role: "reset".to_string(),
            content: String::new(),
            message_id: None,
            model: None,
            is_error: None,
        };
        self.write_entry(&entry).await;
    }

    async fn write_entry(&mut self, entry: &LogEntry) {
        let Some(file) = &mut self.file else {
            return;
        };
        match serde_json::to_string(entry) {
            Ok(json) => {
                if let Err(e) = file.write_all(json.as_bytes()).await {
                    tracing::warn!(path = %self.file_path.display(), "transcript write failed: {}", e);
                } else if let Err(e) = file.write_all(b"\n").await {
                    tracing::warn!(path = %self.file_path.display(), "transcript write failed: {}", e);
                } else {
                    let _ = file.flush().await;
                }
            }
            Err(e) => tracing::warn!("transcript entry not serializable: {}", e),
        }
    }

    /// Close the logger (explicit drop). Called on graceful shutdown.
    pub async fn shutdown(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all().await;
        }
    }
}
