//! # veritas-llm-api
//!
//! Client side of the prompt backend contract: one `POST <base>/generate/`
//! per prompt, JSON in and JSON out.
//!
//! - **`PromptBackend`**: the seam the chat session talks to
//! - **`HttpBackend`**: reqwest implementation, plus the raw pass-through
//!   call used by the local relay endpoint
//! - **`BackendConfig`**: base URL resolution and debug logging switches
//!
//! ## Example
//!
//! ```rust,no_run
//! use veritas_llm_api::{BackendConfig, HttpBackend, PromptBackend};
//! use veritas_types::PromptRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = HttpBackend::new(&BackendConfig::new("http://localhost:8000"));
//!     let reply = backend.forward(&PromptRequest::new("Hello!")).await?;
//!     println!("{}: {}", reply.model, reply.response);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;


pub use client::{BackendError, HttpBackend, PromptBackend};

pub use config::{normalize_backend_url, BackendConfig, DEFAULT_BACKEND_URL};
