//! Energy-gate voice-activity detection
//!
//! Mean-amplitude threshold over fixed-interval frames. No spectral or ML
//! classification: a frame is "loud" when its mean absolute amplitude reaches
//! the quiet threshold, and speech ends after a continuous run of quiet
//! frames covering the configured quiet duration.

/// Event produced by feeding a frame to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// No state change
    None,
    /// First loud frame since the last reset
    SpeechStart,
    /// Sustained quiet reached the configured duration (fires once per reset)
    SpeechEnd,
}

/// Energy-gate detector segmenting speech by silence
#[derive(Debug)]
pub struct VoiceActivityDetector {
    quiet_threshold: f32,
    quiet_samples: usize,
    silence_counter: usize,
    speech_seen: bool,
    ended: bool,
}

impl VoiceActivityDetector {
    /// Create a detector
    ///
    /// * `quiet_threshold` - mean-amplitude level below which a frame counts
    ///   as quiet
    /// * `quiet_duration_ms` - continuous quiet needed to signal speech end
    /// * `sample_rate` - sample rate of the frames fed to [`process`](Self::process)
    #[must_use]
    pub fn new(quiet_threshold: f32, quiet_duration_ms: u64, sample_rate: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let quiet_samples = (u64::from(sample_rate) * quiet_duration_ms / 1000) as usize;

        Self {
            quiet_threshold,
            quiet_samples,
            silence_counter: 0,
            speech_seen: false,
            ended: false,
        }
    }

    /// Feed one frame of samples
    ///
    /// A loud frame resets (never stacks) the pending quiet timer. Once
    /// `SpeechEnd` has fired, further frames return `None` until
    /// [`reset`](Self::reset).
    pub fn process(&mut self, samples: &[f32]) -> VadEvent {
        if self.ended || samples.is_empty() {
            return VadEvent::None;
        }

        let energy = mean_amplitude(samples);

        if energy >= self.quiet_threshold {
            self.silence_counter = 0;

            if !self.speech_seen {
                self.speech_seen = true;
                tracing::trace!(energy, "speech started");
                return VadEvent::SpeechStart;
            }
            return VadEvent::None;
        }

        self.silence_counter += samples.len();

        if self.silence_counter >= self.quiet_samples {
            self.ended = true;
            tracing::trace!(silence_samples = self.silence_counter, "speech ended");
            return VadEvent::SpeechEnd;
        }

        VadEvent::None
    }

    /// Whether any loud frame has been seen since the last reset
    #[must_use]
    pub const fn speech_seen(&self) -> bool {
        self.speech_seen
    }

    /// Re-arm the detector for a new segment
    pub fn reset(&mut self) {
        self.silence_counter = 0;
        self.speech_seen = false;
        self.ended = false;
    }
}

/// Mean absolute amplitude of a frame
#[allow(clippy::cast_precision_loss)]
fn mean_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s.abs()).sum();
    sum / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn loud(ms: u64) -> Vec<f32> {
        vec![0.5; (u64::from(RATE) * ms / 1000) as usize]
    }

    fn quiet(ms: u64) -> Vec<f32> {
        vec![0.001; (u64::from(RATE) * ms / 1000) as usize]
    }

    #[test]
    fn test_mean_amplitude() {
        assert!(mean_amplitude(&[]) < f32::EPSILON);
        assert!(mean_amplitude(&[0.0; 64]) < 0.001);
        assert!((mean_amplitude(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_speech_start_fires_once() {
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        assert_eq!(vad.process(&loud(100)), VadEvent::SpeechStart);
        assert_eq!(vad.process(&loud(100)), VadEvent::None);
        assert!(vad.speech_seen());
    }

    #[test]
    fn test_speech_end_after_quiet_duration() {
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        vad.process(&loud(200));
        assert_eq!(vad.process(&quiet(400)), VadEvent::None);
        assert_eq!(vad.process(&quiet(500)), VadEvent::SpeechEnd);
    }

    #[test]
    fn test_speech_end_fires_exactly_once() {
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        vad.process(&loud(100));
        assert_eq!(vad.process(&quiet(900)), VadEvent::SpeechEnd);

        // Continued silence must not re-trigger
        assert_eq!(vad.process(&quiet(900)), VadEvent::None);
        assert_eq!(vad.process(&quiet(2000)), VadEvent::None);
    }

    #[test]
    fn test_loud_frame_resets_quiet_timer() {
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        vad.process(&loud(100));
        vad.process(&quiet(700));
        // Volume rises again before the quiet duration elapses
        assert_eq!(vad.process(&loud(50)), VadEvent::None);
        // A fresh 700ms of quiet is still short of the threshold
        assert_eq!(vad.process(&quiet(700)), VadEvent::None);
        assert_eq!(vad.process(&quiet(200)), VadEvent::SpeechEnd);
    }

    #[test]
    fn test_silence_only_still_ends() {
        // Continuous-capture mode feeds the detector from record start, so a
        // segment with no speech at all must still terminate
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        assert_eq!(vad.process(&quiet(900)), VadEvent::SpeechEnd);
        assert!(!vad.speech_seen());
    }

    #[test]
    fn test_reset_rearms() {
        let mut vad = VoiceActivityDetector::new(0.05, 800, RATE);

        vad.process(&quiet(900));
        vad.reset();
        assert_eq!(vad.process(&loud(100)), VadEvent::SpeechStart);
        assert_eq!(vad.process(&quiet(900)), VadEvent::SpeechEnd);
    }
}
