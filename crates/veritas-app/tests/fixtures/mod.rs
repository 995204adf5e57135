#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use veritas::web::routes::{create_router, AppState};
use veritas::web::SessionManager;
use veritas::ClientConfig;
use veritas_llm_api::HttpBackend;

/// Router wired to a mock prompt backend
pub struct TestApp {
    pub backend: MockServer,
    pub manager: Arc<SessionManager>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let backend = MockServer::start().await;
        let base_url = backend.uri();
        Self::with_base_url(backend, base_url)
    }

    /// App whose backend URL points somewhere nothing listens
    pub async fn unreachable() -> Self {
        let backend = MockServer::start().await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Self::with_base_url(backend, format!("http://127.0.0.1:{}", port))
    }

    fn with_base_url(backend: MockServer, base_url: String) -> Self {
        let client_config = ClientConfig {
            backend_url: base_url,
            ..ClientConfig::default()
        };
        let http = Arc::new(HttpBackend::new(&client_config.backend_config()));
        let manager = Arc::new(SessionManager::with_backend(client_config, http));
        let router = create_router(AppState {
            session_manager: manager.clone(),
        });

        Self {
            backend,
            manager,
            router,
        }
    }

    pub async fn mock_reply(&self, prompt: &str, response: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .and(body_partial_json(json!({ "prompt": prompt })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": response,
                "model": "gemini-1.5-flash"
            })))
            .mount(&self.backend)
            .await;
    }

    /// Successful reply held back for `delay`, keeping the session loading meanwhile
    pub async fn mock_delayed_reply(&self, prompt: &str, response: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .and(body_partial_json(json!({ "prompt": prompt })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": response, "model": "x" }))
                    .set_delay(delay),
            )
            .mount(&self.backend)
            .await;
    }

    pub async fn mock_status(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.backend)
            .await;
    }

    pub async fn mock_raw(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.backend)
            .await;
    }

    /// Send a request through the router and decode the JSON reply
    pub async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router.clone(), json_request(method, uri, body)).await
    }

    /// Same as `call`, on its own task
    pub fn spawn_call(&self, method: &str, uri: &str, body: Option<Value>) -> JoinHandle<(StatusCode, Value)> {
        tokio::spawn(send(self.router.clone(), json_request(method, uri, body)))
    }

    pub async fn call_raw(&self, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router.clone(), request).await
    }

    /// Serve the router on a local port, for WebSocket clients
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// Create a session through the API and return its id
    pub async fn create_session(&self) -> String {
        let (status, created) = self.call("POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        created["session_id"].as_str().unwrap().to_string()
    }
}

fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
