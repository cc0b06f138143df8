//! Model client configuration

use crate::llm::prompts::SYSTEM_PROMPT;
use crate::{AmicaError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the hosted model client
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier as the API names it
    pub model_id: String,

    /// API root, without the `/models/...` suffix
    pub base_url: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature; the API default applies when unset
    pub temperature: Option<f32>,

    /// Cap on reply length in tokens
    pub max_output_tokens: Option<u32>,

    /// Instruction sent with every request
    pub system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "gemini-2.5-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
            temperature: None,
            max_output_tokens: None,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ModelConfig {
    /// Create a configuration for the given model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Set the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_id
        )
    }

    /// Read the API key from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(AmicaError::ConfigError(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.model_id.trim().is_empty() {
            return Err("model.model_id must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("model.timeout_secs must be greater than zero".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("model.base_url is not an http(s) URL: {}", self.base_url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.model_id, "gemini-2.5-pro");
        assert_eq!(config.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint() {
        let config = ModelConfig::new("gemini-2.5-flash").with_base_url("http://localhost:8080/v1/");
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ModelConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(ModelConfig::new(" ").validate().is_err());
        assert!(ModelConfig::default().with_base_url("ftp://x").validate().is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = ModelConfig::default();
        config.api_key_env = "AMICA_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(matches!(
            config.resolve_api_key(),
            Err(AmicaError::ConfigError(_))
        ));
    }
}
