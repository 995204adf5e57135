//! Veritas Chat application: CLI, configuration, terminal chat and the
//! web server exposing the relay endpoint and server-held chat sessions.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod web;

pub use cli::{Cli, Commands};
pub use config::{ClientConfig, FileConfig};
pub use app::{setup_from_cli, AppConfig};
