//! Microphone voice capture with local Whisper recognition.
//!
//! Records from the default input device until the phrase ends or the time
//! limit passes, then transcribes the audio with whisper.cpp.

use crate::speech::capture::{downmix, resample_for_whisper, PhraseDetector};
use crate::speech::stt::{VoiceCaptureAdapter, VoiceCaptureError, VoiceConfig};
use crate::{AmicaError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// [`VoiceCaptureAdapter`] over the default microphone and a Whisper model
pub struct MicrophoneCapture {
    config: VoiceConfig,
    context: WhisperContext,
}

impl MicrophoneCapture {
    /// Load the Whisper model named in `config`
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        info!("Loading Whisper model from: {:?}", config.model_path);

        if !config.model_path.exists() {
            return Err(AmicaError::VoiceUnavailable(format!(
                "Whisper model not found: {}",
                config.model_path.display()
            )));
        }

        let path = config.model_path.to_str().ok_or_else(|| {
            AmicaError::VoiceUnavailable("Whisper model path is not valid UTF-8".to_string())
        })?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| {
                AmicaError::VoiceUnavailable(format!("Failed to load Whisper model: {:?}", e))
            })?;

        info!("Whisper model loaded");
        Ok(Self {
            config: config.clone(),
            context,
        })
    }

    /// Open the default input device and stream mono blocks into `audio_tx`
    fn open_stream(
        &self,
        audio_tx: Sender<Vec<f32>>,
    ) -> std::result::Result<(Stream, u32), VoiceCaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| recognition("no input device available"))?;
        let supported = device
            .default_input_config()
            .map_err(|e| recognition(format!("failed to get input config: {}", e)))?;

        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        debug!("Capturing at {}Hz, {} channel(s)", sample_rate, channels);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Err(e) = audio_tx.try_send(downmix(data, channels)) {
                        warn!("Dropping captured audio: {}", e);
                    }
                },
                |err| error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| recognition(format!("failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| recognition(format!("failed to start input stream: {}", e)))?;

        Ok((stream, sample_rate))
    }

    fn transcribe(&self, samples: &[f32]) -> std::result::Result<String, VoiceCaptureError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.config.n_threads);
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        if let Some(ref lang) = self.config.language {
            params.set_language(Some(lang));
        }

        let mut state = self
            .context
            .create_state()
            .map_err(|e| recognition(format!("failed to create state: {:?}", e)))?;
        state
            .full(params, samples)
            .map_err(|e| recognition(format!("transcription failed: {:?}", e)))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| recognition(format!("failed to get segments: {:?}", e)))?;
        let mut text = String::new();
        for i in 0..segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| recognition(format!("failed to get segment text: {:?}", e)))?;
            text.push_str(&segment);
        }

        debug!("Transcription result: '{}'", text.trim());
        Ok(text.trim().to_string())
    }
}

impl VoiceCaptureAdapter for MicrophoneCapture {
    fn capture(&self, time_limit: Duration) -> std::result::Result<String, VoiceCaptureError> {
        let (audio_tx, audio_rx) = bounded(256);
        let (stream, sample_rate) = self.open_stream(audio_tx)?;

        let mut detector =
            PhraseDetector::new(self.config.energy_threshold, self.config.pause_secs, sample_rate);
        let mut samples = Vec::new();
        let deadline = Instant::now() + time_limit;

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match audio_rx.recv_timeout(remaining) {
                Ok(block) => {
                    detector.push(&block);
                    samples.extend(block);
                    if detector.phrase_complete() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(recognition("input stream closed"));
                }
            }
        }
        drop(stream);

        debug!(
            "Captured {:.1}s of audio",
            samples.len() as f32 / sample_rate as f32
        );
        if !detector.heard_speech() {
            return Err(VoiceCaptureError::NoSpeechDetected);
        }

        let audio = resample_for_whisper(&samples, sample_rate)?;
        let text = self.transcribe(&audio)?;
        if text.is_empty() {
            return Err(VoiceCaptureError::NoSpeechDetected);
        }
        Ok(text)
    }
}

fn recognition(message: impl Into<String>) -> VoiceCaptureError {
    VoiceCaptureError::RecognitionError(message.into())
}
