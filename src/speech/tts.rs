//! Text-to-speech: the synthesizer seam, a cloud implementation, and the
//! detached dispatcher the orchestrator uses.
//!
//! Speech is best-effort. Nothing here reports back to the turn that asked
//! for it; failures end up in the log and nowhere else.

use crate::{AmicaError, Result};
use crossbeam_channel::{unbounded, Sender};
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Longest text the translate TTS endpoint accepts per request
pub const MAX_CHUNK_CHARS: usize = 100;

/// File name of the most recent synthesized reply
pub const SPEECH_FILE_NAME: &str = "amica_speech.mp3";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("nothing to speak")]
    EmptyText,

    #[error("TTS request failed: {0}")]
    Request(String),

    #[error("TTS service returned HTTP {0}")]
    Status(u16),

    #[error("failed to write audio: {0}")]
    Io(String),
}

/// Produces audio for a reply. Called from a detached thread.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> std::result::Result<(), SynthesisError>;
}

/// Speech output configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether replies are spoken at all
    pub enabled: bool,

    /// Language code passed to the TTS service
    pub language: String,

    /// TTS endpoint URL
    pub endpoint: String,

    /// Directory the audio file is written to; the system temp dir when unset
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en".to_string(),
            endpoint: "https://translate.google.com/translate_tts".to_string(),
            output_dir: None,
            timeout_secs: 20,
        }
    }
}

impl SpeechConfig {
    /// Disable speech output (text-only mode)
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Path the synthesized audio is written to
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(SPEECH_FILE_NAME)
    }
}

/// Synthesizer backed by the translate TTS endpoint.
///
/// Long replies are split into chunks the endpoint accepts; the MP3 frames
/// of all chunks are concatenated into one file.
pub struct TranslateTtsSynthesizer {
    runtime: Runtime,
    client: Client,
    endpoint: String,
    language: String,
    output_path: PathBuf,
}

impl TranslateTtsSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("amica-tts")
            .enable_all()
            .build()
            .map_err(|e| AmicaError::SpeechError(format!("Failed to create runtime: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AmicaError::SpeechError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            runtime,
            client,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            output_path: config.output_path(),
        })
    }

    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        index: usize,
        total: usize,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        let index = index.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", self.language.as_str()),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", index.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Status(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl SpeechSynthesizer for TranslateTtsSynthesizer {
    fn speak(&self, text: &str) -> std::result::Result<(), SynthesisError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let total = chunks.len();
        let audio = self.runtime.block_on(async {
            let mut audio = Vec::new();
            for (index, chunk) in chunks.iter().enumerate() {
                audio.extend(self.fetch_chunk(chunk, index, total).await?);
            }
            Ok::<_, SynthesisError>(audio)
        })?;

        // Readers of the output file never see a half-written reply
        let partial = self.output_path.with_extension("mp3.part");
        fs::write(&partial, &audio).map_err(|e| SynthesisError::Io(e.to_string()))?;
        fs::rename(&partial, &self.output_path).map_err(|e| SynthesisError::Io(e.to_string()))?;
        debug!(
            "wrote {} bytes of speech to {}",
            audio.len(),
            self.output_path.display()
        );
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking at
/// whitespace where possible. Words longer than `max_chars` are hard-split.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();

        while word_chars.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word_chars.split_off(max_chars);
            chunks.push(word_chars.into_iter().collect());
            word_chars = rest;
        }

        let word_len = word_chars.len();
        if word_len == 0 {
            continue;
        }
        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word_chars);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Runs synthesis on a background worker with a logging-only failure sink.
///
/// Texts are synthesized one at a time in dispatch order, so the audio file
/// always ends up holding the most recently dispatched reply.
#[derive(Clone, Default)]
pub struct SpeechDispatcher {
    queue: Option<Sender<String>>,
}

impl SpeechDispatcher {
    /// Start the speech worker. It exits once every clone of the dispatcher
    /// is dropped.
    pub fn spawn(synthesizer: Arc<dyn SpeechSynthesizer>) -> Result<Self> {
        let (queue_tx, queue_rx) = unbounded::<String>();

        thread::Builder::new()
            .name("amica-speech".to_string())
            .spawn(move || {
                for text in queue_rx {
                    if let Err(e) = synthesizer.speak(&text) {
                        warn!("Speech synthesis failed: {}", e);
                    }
                }
                debug!("speech worker stopped");
            })
            .map_err(|e| AmicaError::SpeechError(format!("Failed to start speech worker: {}", e)))?;

        Ok(Self {
            queue: Some(queue_tx),
        })
    }

    /// A dispatcher that speaks nothing
    pub fn disabled() -> Self {
        Self { queue: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Queue `text` for speech. Returns whether it was queued.
    pub fn dispatch(&self, text: &str) -> bool {
        let Some(queue) = &self.queue else {
            return false;
        };
        match queue.send(text.to_string()) {
            Ok(()) => true,
            Err(_) => {
                warn!("Speech worker is gone, dropping text");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSynth {
        spoken_tx: Sender<String>,
        fail: bool,
    }

    impl SpeechSynthesizer for RecordingSynth {
        fn speak(&self, text: &str) -> std::result::Result<(), SynthesisError> {
            let _ = self.spoken_tx.send(text.to_string());
            if self.fail {
                Err(SynthesisError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_chunk_short_text() {
        assert_eq!(chunk_text("Hello there", 100), vec!["Hello there"]);
        assert!(chunk_text("   ", 100).is_empty());
    }

    #[test]
    fn test_chunk_breaks_at_words() {
        let chunks = chunk_text("aaa bbb ccc ddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    }

    #[test]
    fn test_chunk_hard_splits_long_words() {
        let chunks = chunk_text("xy abcdefghij z", 4);
        assert_eq!(chunks, vec!["xy", "abcd", "efgh", "ij z"]);
    }

    #[test]
    fn test_chunk_keeps_all_words() {
        let text = "I'm very sorry to hear you're feeling this way, but please seek immediate \
help by contacting this helpline: 9152987821. You are not alone.";
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_output_path() {
        let config = SpeechConfig::default().with_output_dir("/tmp/amica");
        assert_eq!(
            config.output_path(),
            PathBuf::from("/tmp/amica").join(SPEECH_FILE_NAME)
        );
        assert!(!SpeechConfig::default().disabled().enabled);
    }

    #[test]
    fn test_dispatch_runs_in_background() {
        let (spoken_tx, spoken_rx) = unbounded();
        let dispatcher = SpeechDispatcher::spawn(Arc::new(RecordingSynth {
            spoken_tx,
            fail: false,
        }))
        .unwrap();

        assert!(dispatcher.dispatch("hello"));
        assert_eq!(
            spoken_rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_dispatch_failure_is_swallowed() {
        let (spoken_tx, spoken_rx) = unbounded();
        let dispatcher = SpeechDispatcher::spawn(Arc::new(RecordingSynth {
            spoken_tx,
            fail: true,
        }))
        .unwrap();

        assert!(dispatcher.dispatch("still fine"));
        assert!(spoken_rx.recv_timeout(Duration::from_secs(2)).is_ok());

        // The worker survives a failed synthesis
        assert!(dispatcher.dispatch("and again"));
        assert_eq!(
            spoken_rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "and again"
        );
    }

    /// Slow synthesizer that tracks how many calls overlap
    struct OverlapSynth {
        active: AtomicUsize,
        max_active: AtomicUsize,
        spoken_tx: Sender<String>,
    }

    impl SpeechSynthesizer for OverlapSynth {
        fn speak(&self, text: &str) -> std::result::Result<(), SynthesisError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            let _ = self.spoken_tx.send(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_is_serialized_in_order() {
        let (spoken_tx, spoken_rx) = unbounded();
        let synth = Arc::new(OverlapSynth {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            spoken_tx,
        });
        let dispatcher = SpeechDispatcher::spawn(synth.clone()).unwrap();

        for text in ["model reply", "helpline", "latest reply"] {
            assert!(dispatcher.dispatch(text));
        }

        let spoken: Vec<String> = (0..3)
            .map(|_| spoken_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(spoken, vec!["model reply", "helpline", "latest reply"]);
        assert_eq!(synth.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_dispatcher() {
        let dispatcher = SpeechDispatcher::disabled();
        assert!(!dispatcher.is_enabled());
        assert!(!dispatcher.dispatch("ignored"));
    }
}
