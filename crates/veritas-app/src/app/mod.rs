// Application entry points for each run mode
pub mod repl;
pub mod setup;
pub mod task;
pub mod web_server;

pub use repl::run_repl_mode;
pub use setup::{create_chat_session, setup_from_cli, AppConfig};
pub use task::run_ask_mode;
pub use web_server::run_web_server;
