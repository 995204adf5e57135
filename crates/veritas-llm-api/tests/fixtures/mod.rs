#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock prompt backend serving `POST /generate/`
pub struct BackendMockServer {
    server: MockServer,
}

impl BackendMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Successful reply for a specific prompt
    pub async fn mock_success(&self, prompt: &str, response: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({ "prompt": prompt })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": response,
                "model": "gemini-1.5-flash",
                "prompt_tokens": 4,
                "completion_tokens": 6,
                "total_tokens": 10
            })))
            .mount(&self.server)
            .await;
    }

    /// Successful reply that only matches an exact request body
    pub async fn mock_exact_request(&self, request: Value, response: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .and(body_json(request))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": response,
                "model": "x"
            })))
            .mount(&self.server)
            .await;
    }

    /// Structured error reply
    pub async fn mock_error(&self, status: u16, error: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": error,
                "details": { "prompt": ["This field is required."] }
            })))
            .mount(&self.server)
            .await;
    }

    /// Arbitrary JSON reply
    pub async fn mock_json(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Non-JSON reply, as a misbehaving proxy in front of the backend would send
    pub async fn mock_raw(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/generate/"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the backend has seen
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Base URL nothing is listening on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
