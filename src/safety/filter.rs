//! Crisis phrase detection
//!
//! Runs on every turn before anything is sent to the model. Matching is a
//! plain case-insensitive substring test: false positives are acceptable,
//! misses are not.

use serde::Deserialize;
use tracing::info;

/// Crisis phrases checked when no configuration overrides them
pub const DEFAULT_CRISIS_PHRASES: &[&str] = &[
    "kill myself",
    "want to die",
    "commit suicide",
    "end my life",
    "suicidal",
];

/// Response returned verbatim for flagged input
pub const DEFAULT_HELPLINE_MESSAGE: &str = "I'm very sorry to hear you're feeling this way, \
but please seek immediate help by contacting this helpline: 9152987821. You are not alone.";

/// Result of classifying one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Flagged,
    Normal,
}

/// Safety filter configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Phrases that trigger the crisis response
    pub phrases: Vec<String>,

    /// Text sent back instead of a model reply
    pub helpline_message: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_CRISIS_PHRASES.iter().map(|p| p.to_string()).collect(),
            helpline_message: DEFAULT_HELPLINE_MESSAGE.to_string(),
        }
    }
}

impl SafetyConfig {
    /// Replace the phrase list
    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    /// Set the helpline response text
    pub fn with_helpline_message(mut self, message: impl Into<String>) -> Self {
        self.helpline_message = message.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err("safety.phrases must contain at least one phrase".to_string());
        }
        if self.helpline_message.trim().is_empty() {
            return Err("safety.helpline_message must not be empty".to_string());
        }
        Ok(())
    }
}

/// Keyword-based crisis classifier
#[derive(Clone, Debug)]
pub struct SafetyFilter {
    /// Lowercased, trimmed, non-empty phrases
    phrases: Vec<String>,
    helpline_message: String,
}

impl SafetyFilter {
    pub fn new(config: &SafetyConfig) -> Self {
        let phrases = config
            .phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            phrases,
            helpline_message: config.helpline_message.clone(),
        }
    }

    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        match self.phrases.iter().find(|p| lowered.contains(p.as_str())) {
            Some(phrase) => {
                info!(phrase = %phrase, "crisis phrase detected");
                Classification::Flagged
            }
            None => Classification::Normal,
        }
    }

    pub fn helpline_message(&self) -> &str {
        &self.helpline_message
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new(&SafetyConfig::default())
    }
}
