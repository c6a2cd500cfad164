//! Voice processing module
//!
//! Audio capture, energy-gate voice-activity detection, and playback.
//! STT and TTS live in `providers`; the state machine in `session`.

mod capture;
mod playback;
mod vad;

pub use capture::{AudioCapture, AudioInput, SAMPLE_RATE, samples_to_wav};
pub use playback::AudioPlayback;
pub use vad::{VadEvent, VoiceActivityDetector};

use async_trait::async_trait;

use crate::Result;

/// Capability interface over an audio output sink
///
/// Counterpart of [`AudioInput`]: the session controller plays replies
/// through this trait, so tests can run without audio hardware.
#[async_trait]
pub trait AudioOutput: Send {
    /// Play MP3 audio to completion (or until stopped)
    async fn play_mp3(&mut self, mp3: &[u8]) -> Result<()>;

    /// Interrupt the current playback, discarding what remains
    fn request_stop(&self);
}

#[async_trait]
impl AudioOutput for AudioPlayback {
    async fn play_mp3(&mut self, mp3: &[u8]) -> Result<()> {
        AudioPlayback::play_mp3(self, mp3).await
    }

    fn request_stop(&self) {
        AudioPlayback::request_stop(self);
    }
}

/// A captured microphone buffer bounded by VAD start/stop
///
/// Transient: encoded to WAV for transcription, never persisted.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    /// Segment length in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }

    /// Encode as 16-bit PCM WAV
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}
