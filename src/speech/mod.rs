//! Speech processing seams for STT and TTS
//!
//! This module provides:
//! - Voice capture (speech-to-text) behind `VoiceCaptureAdapter`, with a
//!   microphone + Whisper implementation when built with `audio-io`
//! - Speech synthesis behind `SpeechSynthesizer`, with a cloud implementation
//!   and a background speech worker

pub mod capture;
#[cfg(feature = "audio-io")]
pub mod microphone;
pub mod stt;
pub mod tts;

// Re-export commonly used types
#[cfg(feature = "audio-io")]
pub use microphone::MicrophoneCapture;
pub use stt::{VoiceCaptureAdapter, VoiceCaptureError, VoiceConfig};
pub use tts::{
    chunk_text, SpeechConfig, SpeechDispatcher, SpeechSynthesizer, SynthesisError,
    TranslateTtsSynthesizer,
};
