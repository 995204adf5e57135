use anyhow::Result;
use clap::{CommandFactory, Parser};

use veritas::app::{run_ask_mode, run_repl_mode, run_web_server, setup_from_cli};
use veritas::logging::init_tracing;
use veritas::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "veritas", &mut std::io::stdout());
        return Ok(());
    }

    // The server narrates its work; interactive modes stay quiet unless asked
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(default_level, cli.verbose);

    let app_config = setup_from_cli(&cli)?;

    match &cli.command {
        Commands::Serve { bind, port, web_dir } => {
            run_web_server(bind, *port, web_dir.clone(), app_config).await
        }
        Commands::Chat => run_repl_mode(app_config).await,
        Commands::Ask { prompt, pretty } => run_ask_mode(prompt, *pretty, app_config).await,
        Commands::Completions { .. } => Ok(()),
    }
}
