/// Backend base URL used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Route the backend serves prompts on
const GENERATE_PATH: &str = "/generate/";

/// Where and how to reach the prompt backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Dump requests and responses to the console
    pub verbose: bool,
    /// Write requests and responses under ~/.veritas/logs
    pub log_requests: bool,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verbose: false,
            log_requests: false,
        }
    }

    /// Full URL prompts are POSTed to
    pub fn endpoint_url(&self) -> String {
        normalize_backend_url(&self.base_url)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

/// Normalize a backend URL so it points at the generate route
pub fn normalize_backend_url(url: &str) -> String {
    let url = url.trim();

    if names_generate_route(url) {
        return url.to_string();
    }

    format!("{}{}", url.trim_end_matches('/'), GENERATE_PATH)
}

/// True when the last path segment of `url` is `generate`; the host is never inspected
fn names_generate_route(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    let last = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());
    last == Some("generate")
}
