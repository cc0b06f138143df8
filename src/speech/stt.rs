//! Voice capture seam
//!
//! Microphone access and recognition live behind [`VoiceCaptureAdapter`];
//! the orchestrator only sees the finalized text or a failure.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceCaptureError {
    /// The session ended without recognizable speech
    #[error("no speech detected")]
    NoSpeechDetected,

    /// Device or recognizer failure
    #[error("recognition failed: {0}")]
    RecognitionError(String),
}

/// Records one phrase and returns the recognized text.
///
/// Blocks until the phrase ends or `time_limit` elapses.
pub trait VoiceCaptureAdapter: Send + Sync {
    fn capture(&self, time_limit: Duration) -> Result<String, VoiceCaptureError>;
}

/// Voice input configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Longest phrase recorded per capture, in seconds
    pub phrase_time_limit_secs: u64,

    /// Whisper model file used by the microphone adapter
    pub model_path: PathBuf,

    /// Language to transcribe (None for auto-detection)
    pub language: Option<String>,

    /// Threads used for transcription
    pub n_threads: i32,

    /// RMS level above which a block counts as speech
    pub energy_threshold: f32,

    /// Quiet time after speech that ends the phrase, in seconds
    pub pause_secs: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            phrase_time_limit_secs: 6,
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            language: Some("en".to_string()),
            n_threads: 4,
            energy_threshold: 0.01,
            pause_secs: 0.8,
        }
    }
}

impl VoiceConfig {
    pub fn phrase_time_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_time_limit_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.phrase_time_limit_secs == 0 {
            return Err("voice.phrase_time_limit_secs must be greater than zero".to_string());
        }
        if self.n_threads < 1 {
            return Err("voice.n_threads must be at least 1".to_string());
        }
        if self.energy_threshold.is_nan() || self.energy_threshold <= 0.0 {
            return Err("voice.energy_threshold must be positive".to_string());
        }
        Ok(())
    }
}
