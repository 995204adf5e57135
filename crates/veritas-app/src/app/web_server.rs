use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::app::setup::AppConfig;
use crate::web::server::{WebServer, WebServerConfig};

/// Run the web server
pub async fn run_web_server(
    bind: &str,
    port: u16,
    web_dir: Option<PathBuf>,
    app_config: AppConfig,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    tracing::info!(
        backend = %app_config.client_config.backend_config().endpoint_url(),
        work_dir = %app_config.work_dir.display(),
        "starting Veritas web server"
    );

    let config = WebServerConfig {
        bind_addr: addr,
        client_config: app_config.client_config,
        web_dir,
    };

    WebServer::new(config).start().await
}
