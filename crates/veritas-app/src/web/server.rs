use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::ClientConfig;
use crate::web::{routes, session_manager::SessionManager};

/// Web server configuration
pub struct WebServerConfig {
    pub bind_addr: SocketAddr,
    pub client_config: ClientConfig,
    pub web_dir: Option<PathBuf>,
}

/// Web server instance
pub struct WebServer {
    config: WebServerConfig,
    session_manager: Arc<SessionManager>,
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: WebServerConfig) -> Self {
        let session_manager = Arc::new(SessionManager::new(config.client_config.clone()));

        Self {
            config,
            session_manager,
        }
    }

    /// Start the web server and run until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let app_state = routes::AppState {
            session_manager: self.session_manager.clone(),
        };

        let mut app = routes::create_router(app_state);

        // Browser clients may be served from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors).layer(TraceLayer::new_for_http());

        if let Some(web_dir) = &self.config.web_dir {
            if web_dir.exists() {
                tracing::info!("serving static files from {}", web_dir.display());
                app = app.nest_service("/static", ServeDir::new(web_dir));
            } else {
                tracing::warn!("web dir {} does not exist, not serving static files", web_dir.display());
            }
        }

        println!("🌐 Veritas server starting on http://{}", self.config.bind_addr);
        println!("   Relay endpoint: http://{}/api/chat", self.config.bind_addr);
        println!("   Session API: http://{}/api/sessions", self.config.bind_addr);
        println!("   WebSocket endpoint: ws://{}/ws/{{session_id}}", self.config.bind_addr);
        println!(
            "   Backend: {}",
            self.session_manager.backend().endpoint()
        );

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let sessions = self.session_manager.session_count().await;
        tracing::info!(sessions, "server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
