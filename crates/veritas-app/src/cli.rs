use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// CLI arguments for veritas
#[derive(Parser, Debug)]
#[command(name = "veritas")]
#[command(about = "Veritas Chat - chat client and relay for a prompt backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the prompt backend (the /generate/ route is appended)
    #[arg(long, value_name = "URL", env = "VERITAS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Model to request from the backend (backend default if unset)
    #[arg(long, value_name = "MODEL", env = "VERITAS_MODEL", global = true)]
    pub model: Option<String>,

    /// Sampling temperature, 0.0 to 1.0
    #[arg(long, value_name = "TEMP", env = "VERITAS_TEMPERATURE", global = true)]
    pub temperature: Option<f64>,

    /// Maximum number of tokens the backend may generate
    #[arg(long, value_name = "N", env = "VERITAS_MAX_OUTPUT_TOKENS", global = true)]
    pub max_output_tokens: Option<u32>,

    /// Path to a TOML config file (default: veritas.toml in the working directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose debug output (dumps backend requests and responses)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Write every backend request and response under ~/.veritas/logs
    #[arg(long, global = true)]
    pub log_requests: bool,

    /// Record conversations as JSONL transcripts
    #[arg(long, global = true)]
    pub transcript: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web server: relay endpoint, session API and WebSocket updates
    Serve {
        /// Web server bind address
        #[arg(long, default_value = "127.0.0.1", env = "VERITAS_WEB_BIND")]
        bind: String,

        /// Web server port
        #[arg(long, default_value = "3000", env = "VERITAS_WEB_PORT")]
        port: u16,

        /// Directory of static files served under /static
        #[arg(long, value_name = "DIR")]
        web_dir: Option<PathBuf>,
    },

    /// Chat interactively in the terminal
    Chat,

    /// Send a single prompt and print the reply
    Ask {
        /// Prompt text
        prompt: String,

        /// Print the final session state as pretty JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
