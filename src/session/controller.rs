//! The listening→thinking→speaking state machine
//!
//! One `VoiceSession` owns the whole capture lifecycle: microphone
//! acquisition, VAD-bounded recording segmentation, and the gates that keep
//! at most one segment capture and one outstanding turn in flight. The
//! async driver in `session::run_session` feeds it frames on a fixed tick;
//! everything here is synchronous and deterministic.

use std::time::Instant;

use crate::config::SessionTuning;
use crate::voice::{AudioInput, AudioSegment, VadEvent, VoiceActivityDetector};
use crate::Result;

/// Session state; exactly one is active and gates which operations are legal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// No microphone held, nothing in flight
    Idle,
    /// Microphone open, waiting for sound (VAD-gated mode only)
    Listening,
    /// Accumulating an audio segment
    Recording,
    /// Segment submitted, waiting for transcription/reply
    Thinking,
    /// Playing the synthesized reply
    Speaking,
}

/// When recording starts after entering Listening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Capture starts immediately on activation
    Continuous,
    /// Capture starts once volume first exceeds the quiet threshold
    VadGated,
}

/// Voice session state machine
pub struct VoiceSession {
    mode: ListenMode,
    tuning: SessionTuning,
    sample_rate: u32,
    state: VoiceState,
    vad: VoiceActivityDetector,
    segment: Vec<f32>,
    last_submit: Option<Instant>,
    turn: u64,
}

impl VoiceSession {
    /// Create a session in `Idle`
    #[must_use]
    pub fn new(mode: ListenMode, tuning: SessionTuning, sample_rate: u32) -> Self {
        let vad = VoiceActivityDetector::new(
            tuning.quiet_threshold,
            tuning.quiet_duration.as_millis() as u64,
            sample_rate,
        );

        Self {
            mode,
            tuning,
            sample_rate,
            state: VoiceState::Idle,
            vad,
            segment: Vec::new(),
            last_submit: None,
            turn: 0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> VoiceState {
        self.state
    }

    /// Session tuning
    #[must_use]
    pub const fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    /// Identifier of the current (or most recently submitted) turn
    ///
    /// Late results carry this token back through [`begin_speaking`](Self::begin_speaking)
    /// and [`turn_done`](Self::turn_done); a stale token is ignored, which is
    /// what suppresses a response that arrives after deactivation.
    #[must_use]
    pub const fn current_turn(&self) -> u64 {
        self.turn
    }

    /// Activate the session: acquire the microphone and start listening
    ///
    /// No-op unless Idle. In continuous mode recording starts immediately;
    /// in VAD-gated mode it waits for the first loud frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`](crate::Error::Device) if the input cannot be
    /// acquired; the session stays Idle and is not retried.
    pub fn activate(&mut self, input: &mut dyn AudioInput) -> Result<()> {
        if self.state != VoiceState::Idle {
            tracing::debug!(state = ?self.state, "activate ignored");
            return Ok(());
        }

        input.start()?;
        self.state = VoiceState::Listening;
        tracing::info!(mode = ?self.mode, "session activated");

        if self.mode == ListenMode::Continuous {
            self.begin_recording();
        }
        Ok(())
    }

    /// Deactivate from any state: release the microphone and invalidate any
    /// outstanding turn so a late response cannot mutate state
    pub fn deactivate(&mut self, input: &mut dyn AudioInput) {
        input.stop();
        self.turn += 1;
        self.segment.clear();
        self.vad.reset();
        self.state = VoiceState::Idle;
        tracing::info!("session deactivated");
    }

    /// Feed one tick's worth of captured frames
    ///
    /// Returns a finalized segment when sustained quiet ends the recording.
    /// Frames arriving while Thinking/Speaking are discarded (the microphone
    /// stays open but is effectively muted).
    pub fn feed(&mut self, frames: &[f32]) -> Option<AudioSegment> {
        if frames.is_empty() {
            return None;
        }

        match self.state {
            VoiceState::Listening => {
                if self.mode == ListenMode::VadGated {
                    match self.vad.process(frames) {
                        VadEvent::SpeechStart => {
                            self.state = VoiceState::Recording;
                            self.segment.extend_from_slice(frames);
                            tracing::debug!("sound detected, recording");
                        }
                        // Sustained quiet latches the detector; re-arm it or
                        // recording could never start after a quiet stretch
                        VadEvent::SpeechEnd => self.vad.reset(),
                        VadEvent::None => {}
                    }
                }
                None
            }
            VoiceState::Recording => {
                self.segment.extend_from_slice(frames);
                match self.vad.process(frames) {
                    VadEvent::SpeechEnd => self.finalize_segment(),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Explicit user stop: finalize the current recording immediately
    pub fn stop_recording(&mut self) -> Option<AudioSegment> {
        if self.state == VoiceState::Recording {
            self.finalize_segment()
        } else {
            None
        }
    }

    /// Thinking → Speaking, if `turn` is still the live one
    pub fn begin_speaking(&mut self, turn: u64) -> bool {
        if turn != self.turn || self.state != VoiceState::Thinking {
            return false;
        }
        self.state = VoiceState::Speaking;
        true
    }

    /// Finish the turn (reply played, empty transcription, or failure) and
    /// resume listening, if `turn` is still the live one
    pub fn turn_done(&mut self, turn: u64) -> bool {
        if turn != self.turn {
            tracing::debug!(turn, live = self.turn, "stale turn result dropped");
            return false;
        }
        if !matches!(self.state, VoiceState::Thinking | VoiceState::Speaking) {
            return false;
        }
        self.resume_listening();
        true
    }

    /// Finalize the accumulated segment and move to Thinking
    ///
    /// A submit inside the cooldown window (timer/event overlap after the
    /// previous submission) is suppressed and recording continues.
    fn finalize_segment(&mut self) -> Option<AudioSegment> {
        let samples = std::mem::take(&mut self.segment);
        self.vad.reset();

        if let Some(at) = self.last_submit {
            if at.elapsed() < self.tuning.submit_cooldown {
                tracing::debug!("submission inside cooldown window, dropped");
                return None;
            }
        }

        let segment = AudioSegment {
            samples,
            sample_rate: self.sample_rate,
        };

        if segment.duration_ms() < self.tuning.min_segment.as_millis() as u64 {
            tracing::debug!(ms = segment.duration_ms(), "segment too short, dropped");
            return None;
        }

        self.last_submit = Some(Instant::now());
        self.turn += 1;
        self.state = VoiceState::Thinking;

        tracing::debug!(ms = segment.duration_ms(), turn = self.turn, "segment finalized");
        Some(segment)
    }

    /// Back to Listening (and straight to Recording in continuous mode)
    fn resume_listening(&mut self) {
        self.state = VoiceState::Listening;
        if self.mode == ListenMode::Continuous {
            self.begin_recording();
        }
    }

    fn begin_recording(&mut self) {
        self.segment.clear();
        self.vad.reset();
        self.state = VoiceState::Recording;
    }
}
