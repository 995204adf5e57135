//! Client configuration: CLI flags and environment first, then the optional
//! TOML file, then built-in defaults.

use anyhow::Result;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::Cli;
use veritas_chat::SessionOptions;
use veritas_llm_api::{BackendConfig, DEFAULT_BACKEND_URL};
use veritas_types::DEFAULT_TEMPERATURE;

pub mod file;
pub use file::FileConfig;

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "veritas.toml";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f64),
    #[error("max_output_tokens must be at least 1")]
    InvalidMaxOutputTokens,
    #[error("backend URL must start with http:// or https://, got '{0}'")]
    InvalidBackendUrl(String),
}

/// Fully resolved client settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub model: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
    pub verbose: bool,
    pub log_requests: bool,
    /// Directory for JSONL transcripts; `None` disables them
    pub transcript_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: None,
            verbose: false,
            log_requests: false,
            transcript_dir: None,
        }
    }
}

impl ClientConfig {
    /// Merge CLI/environment values over the file config and defaults
    pub fn resolve(cli: &Cli, file: &FileConfig, default_transcript_dir: impl FnOnce() -> Result<PathBuf>) -> Result<Self> {
        let defaults = ClientConfig::default();

        let transcript_dir = if cli.transcript || file.transcript.unwrap_or(false) {
            match &file.transcript_dir {
                Some(dir) => Some(dir.clone()),
                None => Some(default_transcript_dir()?),
            }
        } else {
            None
        };

        let config = ClientConfig {
            backend_url: cli
                .api_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .or_else(|| file.backend_url.clone())
                .unwrap_or(defaults.backend_url),
            model: cli.model.clone().or_else(|| file.model.clone()),
            temperature: cli
                .temperature
                .or(file.temperature)
                .unwrap_or(defaults.temperature),
            max_output_tokens: cli.max_output_tokens.or(file.max_output_tokens),
            verbose: cli.verbose,
            log_requests: cli.log_requests || file.log_requests.unwrap_or(false),
            transcript_dir,
        };

        config.validate()?;
        Ok(config)
    }

    /// Same bounds the backend enforces on its side
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.max_output_tokens == Some(0) {
            return Err(ConfigError::InvalidMaxOutputTokens);
        }
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBackendUrl(self.backend_url.clone()));
        }
        Ok(())
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.backend_url.clone(),
            verbose: self.verbose,
            log_requests: self.log_requests,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Config file to read: the explicit path, or `veritas.toml` in `work_dir` if present
pub fn config_file_path(explicit: Option<&Path>, work_dir: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = work_dir.join(DEFAULT_CONFIG_FILE);
            candidate.exists().then_some(candidate)
        }
    }
}
