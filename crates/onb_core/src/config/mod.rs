use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Chat surface settings. Every field has a default, so a partial JSON file
/// (or no file at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Text of the assistant message appended when the provider fails.
    pub failure_message: String,
    /// Text of the assistant message appended when the caller abandons a
    /// pending answer.
    pub cancelled_message: String,
    pub require_ready_sources: bool,
    pub max_question_chars: usize,
    pub log_filter: String,
    pub ollama: OllamaConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            failure_message: "Sorry, I couldn't answer that right now. Please try again."
                .to_string(),
            cancelled_message: "This answer was cancelled before it finished.".to_string(),
            require_ready_sources: false,
            max_question_chars: 4000,
            log_filter: "info".to_string(),
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_excerpt_chars: usize,
    pub max_excerpts: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            timeout_secs: 30,
            max_excerpt_chars: 1600,
            max_excerpts: 12,
        }
    }
}

impl ChatConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let config: ChatConfig = serde_json::from_str(raw).map_err(|e| {
            AppError::new("CONFIG_PARSE_FAILED", "Failed to parse chat config")
                .with_details(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no chat config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read chat config")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.failure_message.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "failure_message must not be empty"));
        }
        if self.cancelled_message.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "cancelled_message must not be empty"));
        }
        if self.max_question_chars == 0 {
            return Err(AppError::new("CONFIG_INVALID", "max_question_chars must be > 0"));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(AppError::new("CONFIG_INVALID", "ollama.timeout_secs must be > 0"));
        }
        if self.ollama.max_excerpts == 0 || self.ollama.max_excerpt_chars == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "ollama excerpt limits must be > 0",
            )
            .with_details(format!(
                "max_excerpts={}; max_excerpt_chars={}",
                self.ollama.max_excerpts, self.ollama.max_excerpt_chars
            )));
        }
        Ok(())
    }
}
