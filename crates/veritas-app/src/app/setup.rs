use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Cli;
use crate::config::{config_file_path, ClientConfig, FileConfig};
use veritas_chat::{ChatSession, SessionOptions};
use veritas_llm_api::PromptBackend;
use veritas_logging::ConversationLogger;

/// Application configuration derived from CLI arguments and environment
pub struct AppConfig {
    pub client_config: ClientConfig,
    pub work_dir: PathBuf,
}

/// Set up application configuration from CLI arguments
pub fn setup_from_cli(cli: &Cli) -> Result<AppConfig> {
    let work_dir = env::current_dir().context("Failed to determine working directory")?;

    // Precedence: CLI flags / VERITAS_* env > config file > defaults
    let file_config = match config_file_path(cli.config.as_deref(), &work_dir) {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            FileConfig::load(&path)?
        }
        None => FileConfig::default(),
    };

    let client_config = ClientConfig::resolve(cli, &file_config, veritas_logging::get_logs_dir)?;
    tracing::debug!(?client_config, "configuration resolved");

    Ok(AppConfig {
        client_config,
        work_dir,
    })
}

/// Build a chat session, attaching a transcript when configured
pub async fn create_chat_session(
    client_config: &ClientConfig,
    options: SessionOptions,
    backend: Arc<dyn PromptBackend>,
) -> Result<ChatSession> {
    let session = ChatSession::new(backend, options);

    match &client_config.transcript_dir {
        Some(dir) => {
            let logger = ConversationLogger::new(dir)
                .await
                .with_context(|| format!("Failed to open transcript in {}", dir.display()))?;
            tracing::info!("transcript: {}", logger.file_path().display());
            Ok(session.with_logger(logger))
        }
        None => Ok(session),
    }
}
