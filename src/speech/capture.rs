//! Device-independent pieces of voice capture: phrase end detection and
//! conversion of microphone audio to the 16 kHz mono input Whisper expects.

use crate::speech::stt::VoiceCaptureError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Sample rate Whisper models are trained on
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved frames down to mono
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Root mean square level of a block of samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Decides when a spoken phrase has ended.
///
/// A phrase starts with the first block louder than the energy threshold
/// and ends once `pause_samples` of quiet audio follow it.
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    energy_threshold: f32,
    pause_samples: usize,
    heard_speech: bool,
    quiet_run: usize,
}

impl PhraseDetector {
    pub fn new(energy_threshold: f32, pause_secs: f32, sample_rate: u32) -> Self {
        Self {
            energy_threshold,
            pause_samples: (pause_secs.max(0.0) * sample_rate as f32) as usize,
            heard_speech: false,
            quiet_run: 0,
        }
    }

    /// Feed one block of mono samples
    pub fn push(&mut self, block: &[f32]) {
        if rms(block) >= self.energy_threshold {
            self.heard_speech = true;
            self.quiet_run = 0;
        } else if self.heard_speech {
            self.quiet_run += block.len();
        }
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// Speech was heard and has been followed by a long enough pause
    pub fn phrase_complete(&self) -> bool {
        self.heard_speech && self.quiet_run >= self.pause_samples
    }
}

/// Resample mono audio to [`WHISPER_SAMPLE_RATE`]
pub fn resample_for_whisper(
    input: &[f32],
    input_rate: u32,
) -> Result<Vec<f32>, VoiceCaptureError> {
    if input_rate == 0 {
        return Err(VoiceCaptureError::RecognitionError(
            "input sample rate is zero".to_string(),
        ));
    }
    if input_rate == WHISPER_SAMPLE_RATE || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = WHISPER_SAMPLE_RATE as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk_size = 1024;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| VoiceCaptureError::RecognitionError(format!("resampler: {}", e)))?;

    let expected = (input.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected + chunk_size);

    for chunk in input.chunks(chunk_size) {
        // SincFixedIn wants exactly chunk_size frames; the tail is zero-padded
        let mut block = vec![0.0f32; chunk_size];
        block[..chunk.len()].copy_from_slice(chunk);

        let processed = resampler
            .process(&[block], None)
            .map_err(|e| VoiceCaptureError::RecognitionError(format!("resampling: {}", e)))?;
        let take = ((chunk.len() as f64) * ratio).ceil() as usize;
        output.extend(processed[0].iter().take(take));
    }

    debug!(
        "resampled {} samples at {}Hz to {}",
        input.len(),
        input_rate,
        output.len()
    );
    Ok(output)
}
