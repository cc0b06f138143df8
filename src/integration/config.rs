//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components, loadable from a
//! TOML file. Every section and field is optional; missing values fall back
//! to the defaults below.

use crate::llm::config::ModelConfig;
use crate::llm::prompts::{build_system_prompt, SYSTEM_PROMPT};
use crate::safety::SafetyConfig;
use crate::speech::stt::VoiceConfig;
use crate::speech::tts::SpeechConfig;
use crate::{AmicaError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Texts the orchestrator writes into the transcript on its own
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MessageTexts {
    /// Shown once when the orchestrator starts; empty disables it
    pub greeting: String,

    /// Shown when a voice capture starts
    pub listening: String,

    /// Shown when a turn is submitted while a reply is still pending
    pub please_wait: String,

    /// Shown when voice capture heard nothing
    pub no_speech: String,

    /// Voice failure line; `{error}` is replaced with the failure
    pub voice_error: String,

    /// Model failure line; `{error}` is replaced with the failure
    pub model_error: String,
}

impl Default for MessageTexts {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm Amica. How are you feeling today?".to_string(),
            listening: "🎤 Listening...".to_string(),
            please_wait: "I'm still thinking about your last message. Please wait a moment."
                .to_string(),
            no_speech: "Sorry, I didn't catch that.".to_string(),
            voice_error: "Voice error: {error}".to_string(),
            model_error: "Sorry, I encountered an error: {error}".to_string(),
        }
    }
}

impl MessageTexts {
    pub fn voice_error(&self, error: &impl std::fmt::Display) -> String {
        self.voice_error.replace("{error}", &error.to_string())
    }

    pub fn model_error(&self, error: &impl std::fmt::Display) -> String {
        self.model_error.replace("{error}", &error.to_string())
    }
}

/// Configuration for the complete application
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AmicaConfig {
    pub model: ModelConfig,
    pub safety: SafetyConfig,
    pub speech: SpeechConfig,
    pub voice: VoiceConfig,
    pub messages: MessageTexts,
}

impl AmicaConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AmicaConfig = toml::from_str(content)
            .map_err(|e| AmicaError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AmicaError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the model configuration
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Set the safety configuration
    pub fn with_safety(mut self, safety: SafetyConfig) -> Self {
        self.safety = safety;
        self
    }

    /// Model settings with the system prompt carrying the configured
    /// helpline. A system prompt set explicitly in `[model]` is kept as is.
    pub fn model_config(&self) -> ModelConfig {
        let mut model = self.model.clone();
        if model.system_prompt == SYSTEM_PROMPT {
            model.system_prompt =
                build_system_prompt(None, Some(&self.safety.helpline_message));
        }
        model
    }

    /// Disable speech output (text-only mode)
    pub fn without_speech(mut self) -> Self {
        self.speech.enabled = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate().map_err(AmicaError::ConfigError)?;
        self.safety.validate().map_err(AmicaError::ConfigError)?;
        if self.speech.enabled && self.speech.timeout_secs == 0 {
            return Err(AmicaError::ConfigError(
                "speech.timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.voice.validate().map_err(AmicaError::ConfigError)?;
        Ok(())
    }
}
