use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

use crate::app::setup::{create_chat_session, AppConfig};
use veritas_chat::{ChatSession, SendOutcome};
use veritas_llm_api::HttpBackend;
use veritas_logging::safe_truncate;

/// What the user typed at the prompt
#[derive(Debug, PartialEq)]
enum ReplInput<'a> {
    Empty,
    Exit,
    Clear,
    Help,
    Prompt(&'a str),
}

fn parse_input(line: &str) -> ReplInput<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => ReplInput::Empty,
        "exit" | "quit" | "/exit" | "/quit" => ReplInput::Exit,
        "/clear" | "/reset" => ReplInput::Clear,
        "/help" => ReplInput::Help,
        _ => ReplInput::Prompt(trimmed),
    }
}

/// Run interactive REPL mode
pub async fn run_repl_mode(app_config: AppConfig) -> Result<()> {
    let client_config = app_config.client_config;

    println!("{}", "🎓 Veritas Chat".bright_cyan().bold());
    println!(
        "{}",
        format!("Backend: {}", client_config.backend_config().endpoint_url()).bright_black()
    );
    if let Some(model) = &client_config.model {
        println!("{}", format!("Model: {}", model).bright_black());
    }
    println!(
        "{}",
        "Type '/clear' to start over, '/exit' to quit\n".bright_black()
    );

    let backend = Arc::new(HttpBackend::new(&client_config.backend_config()));
    let session = create_chat_session(&client_config, client_config.session_options(), backend).await?;

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&format!("{} ", "you>".bright_green().bold()));
        match readline {
            Ok(line) => match parse_input(&line) {
                ReplInput::Empty => continue,
                ReplInput::Exit => break,
                ReplInput::Help => print_help(),
                ReplInput::Clear => {
                    session.reset().await;
                    println!("{}", "Conversation cleared.".bright_black());
                }
                ReplInput::Prompt(prompt) => {
                    let _ = rl.add_history_entry(prompt);
                    send_and_print(&session, prompt).await;
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {}", "Input error:".red(), err);
                break;
            }
        }
    }

    session.shutdown().await;
    println!("{}", "Goodbye!".bright_cyan());
    Ok(())
}

async fn send_and_print(session: &ChatSession, prompt: &str) {
    println!("{}", "thinking...".bright_black());

    match session.send_prompt(prompt).await {
        SendOutcome::Completed => {
            let state = session.state();
            if let Some(reply) = state.last_message() {
                println!("\n{} {}\n", "veritas>".bright_cyan().bold(), reply.content);
            }
        }
        SendOutcome::Failed => {
            let error = session.state().error.unwrap_or_default();
            eprintln!("{} {}\n", "Error:".red().bold(), safe_truncate(&error, 500));
        }
        SendOutcome::Rejected => {
            eprintln!("{}", "Still waiting for the previous reply.".yellow());
        }
        SendOutcome::Discarded => {}
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_yellow());
    println!("  /clear   start a new conversation");
    println!("  /exit    leave");
    println!("  /help    show this help");
    println!("Anything else is sent to the backend.");
}
