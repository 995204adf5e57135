use anyhow::{anyhow, Result};
use colored::Colorize;
use std::sync::Arc;

use crate::app::setup::{create_chat_session, AppConfig};
use veritas_chat::SendOutcome;
use veritas_llm_api::HttpBackend;

/// Send one prompt, print the reply, and fail the process on a backend error
pub async fn run_ask_mode(prompt: &str, pretty: bool, app_config: AppConfig) -> Result<()> {
    let client_config = app_config.client_config;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(anyhow!("Prompt must not be empty"));
    }

    let backend = Arc::new(HttpBackend::new(&client_config.backend_config()));
    let session = create_chat_session(&client_config, client_config.session_options(), backend).await?;

    let outcome = session.send_prompt(prompt).await;
    session.shutdown().await;
    let state = session.state();

    if pretty {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    match outcome {
        SendOutcome::Completed => {
            if !pretty {
                if let Some(reply) = state.last_message() {
                    println!("{}", reply.content);
                }
            }
            Ok(())
        }
        _ => {
            let error = state
                .error
                .unwrap_or_else(|| "No reply received".to_string());
            eprintln!("{} {}", "Error:".red().bold(), error);
            Err(anyhow!(error))
        }
    }
}
