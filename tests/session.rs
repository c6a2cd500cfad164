//! Voice session state machine tests
//!
//! Drives the controller with synthetic frames: no audio hardware, no
//! network. Frame helpers mirror real 16kHz capture timing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sphere_gateway::config::SessionTuning;
use sphere_gateway::session::{
    run_session, ConversationBackend, ListenMode, TurnReply, VoiceSession, VoiceState,
};
use sphere_gateway::voice::{AudioInput, AudioOutput, SAMPLE_RATE};
use sphere_gateway::{Error, Result};

fn loud(ms: u64) -> Vec<f32> {
    vec![0.4; (u64::from(SAMPLE_RATE) * ms / 1000) as usize]
}

fn quiet(ms: u64) -> Vec<f32> {
    vec![0.001; (u64::from(SAMPLE_RATE) * ms / 1000) as usize]
}

fn tuning() -> SessionTuning {
    SessionTuning {
        quiet_threshold: 0.04,
        quiet_duration: Duration::from_millis(800),
        submit_cooldown: Duration::from_millis(0),
        resume_delay: Duration::from_millis(0),
        stt_watchdog: Duration::from_secs(5),
        min_segment: Duration::from_millis(500),
    }
}

/// Scripted audio input: hands out pre-arranged frame batches
struct ScriptedInput {
    frames: VecDeque<Vec<f32>>,
    started: bool,
}

impl ScriptedInput {
    fn new(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames: frames.into(),
            started: false,
        }
    }
}

impl AudioInput for ScriptedInput {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn take_frames(&mut self) -> Vec<f32> {
        self.frames.pop_front().unwrap_or_default()
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Input whose device acquisition always fails
struct DeadInput;

impl AudioInput for DeadInput {
    fn start(&mut self) -> Result<()> {
        Err(Error::Device("no input device available".to_string()))
    }

    fn stop(&mut self) {}

    fn take_frames(&mut self) -> Vec<f32> {
        Vec::new()
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Output sink that swallows audio
struct NullOutput;

#[async_trait]
impl AudioOutput for NullOutput {
    async fn play_mp3(&mut self, _mp3: &[u8]) -> Result<()> {
        Ok(())
    }

    fn request_stop(&self) {}
}

/// Backend counting calls, with a scripted transcription result
struct CountingBackend {
    transcript: &'static str,
    transcribe_calls: AtomicUsize,
    converse_calls: AtomicUsize,
}

impl CountingBackend {
    fn new(transcript: &'static str) -> Arc<Self> {
        Arc::new(Self {
            transcript,
            transcribe_calls: AtomicUsize::new(0),
            converse_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ConversationBackend for CountingBackend {
    async fn transcribe(&self, _wav: Vec<u8>) -> Result<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.to_string())
    }

    async fn converse(&self, _user_id: &str, text: &str) -> Result<TurnReply> {
        self.converse_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TurnReply {
            reply: format!("echo: {text}"),
            audio: Some(vec![0xFF, 0xFB]),
        })
    }
}

#[test]
fn test_device_failure_stays_idle() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = DeadInput;

    assert!(session.activate(&mut input).is_err());
    assert_eq!(session.state(), VoiceState::Idle);
}

#[test]
fn test_continuous_mode_records_immediately() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);

    session.activate(&mut input).unwrap();
    assert_eq!(session.state(), VoiceState::Recording);
    assert!(input.started);
}

#[test]
fn test_gated_mode_waits_for_sound() {
    let mut session = VoiceSession::new(ListenMode::VadGated, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);

    session.activate(&mut input).unwrap();
    assert_eq!(session.state(), VoiceState::Listening);

    // Quiet frames don't start recording
    assert!(session.feed(&quiet(200)).is_none());
    assert_eq!(session.state(), VoiceState::Listening);

    // First loud frame does
    assert!(session.feed(&loud(100)).is_none());
    assert_eq!(session.state(), VoiceState::Recording);
}

#[test]
fn test_gated_mode_starts_after_long_silence() {
    let mut session = VoiceSession::new(ListenMode::VadGated, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    // Silence longer than the quiet duration must not wedge the detector
    assert!(session.feed(&quiet(900)).is_none());
    assert_eq!(session.state(), VoiceState::Listening);
    assert!(session.feed(&quiet(900)).is_none());
    assert_eq!(session.state(), VoiceState::Listening);

    // Speech after the quiet stretch still starts recording
    assert!(session.feed(&loud(300)).is_none());
    assert_eq!(session.state(), VoiceState::Recording);

    // And the recording finalizes normally
    assert!(session.feed(&quiet(900)).is_some());
    assert_eq!(session.state(), VoiceState::Thinking);
}

#[test]
fn test_sustained_quiet_finalizes_exactly_once() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    assert!(session.feed(&loud(300)).is_none());
    assert!(session.feed(&quiet(400)).is_none());

    // Quiet duration reached: one segment, state moves to Thinking
    let segment = session.feed(&quiet(500)).expect("segment finalized");
    assert_eq!(session.state(), VoiceState::Thinking);
    assert_eq!(segment.duration_ms(), 1200);

    // Continued silence while Thinking produces nothing more
    assert!(session.feed(&quiet(900)).is_none());
    assert!(session.feed(&quiet(900)).is_none());
    assert_eq!(session.state(), VoiceState::Thinking);
}

#[test]
fn test_no_overlapping_capture_during_turn() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    session.feed(&loud(300));
    let _segment = session.feed(&quiet(900)).expect("segment finalized");
    let turn = session.current_turn();

    // Speech during Thinking/Speaking is discarded, not recorded
    assert!(session.feed(&loud(300)).is_none());
    assert!(session.begin_speaking(turn));
    assert!(session.feed(&loud(300)).is_none());

    // Turn completes: back to recording a fresh segment
    assert!(session.turn_done(turn));
    assert_eq!(session.state(), VoiceState::Recording);
}

#[test]
fn test_quiet_timer_resets_on_sound() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    session.feed(&loud(200));
    assert!(session.feed(&quiet(700)).is_none());
    // Volume rises before the quiet duration elapses: timer restarts
    assert!(session.feed(&loud(100)).is_none());
    assert!(session.feed(&quiet(700)).is_none());
    assert!(session.feed(&quiet(200)).is_some());
}

#[test]
fn test_submit_cooldown_suppresses_retrigger() {
    let mut cfg = tuning();
    cfg.submit_cooldown = Duration::from_secs(10);
    let mut session = VoiceSession::new(ListenMode::Continuous, cfg, SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    session.feed(&loud(300));
    let first = session.feed(&quiet(900));
    assert!(first.is_some());
    let turn = session.current_turn();
    assert!(session.turn_done(turn));

    // A second trigger inside the cooldown window is dropped
    session.feed(&loud(300));
    assert!(session.feed(&quiet(900)).is_none());
    assert_eq!(session.state(), VoiceState::Recording);
}

#[test]
fn test_short_segment_dropped() {
    let mut cfg = tuning();
    cfg.quiet_duration = Duration::from_millis(100);
    let mut session = VoiceSession::new(ListenMode::Continuous, cfg, SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    // 50ms of speech + 150ms of quiet is under the minimum segment length
    session.feed(&loud(50));
    assert!(session.feed(&quiet(150)).is_none());
    assert_eq!(session.state(), VoiceState::Recording);
}

#[test]
fn test_deactivation_suppresses_late_response() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    session.feed(&loud(300));
    session.feed(&quiet(900)).expect("segment finalized");
    let turn = session.current_turn();

    // User deactivates while the chain is outstanding
    session.deactivate(&mut input);
    assert_eq!(session.state(), VoiceState::Idle);
    assert!(!input.started);

    // The late-arriving response must not mutate state
    assert!(!session.begin_speaking(turn));
    assert!(!session.turn_done(turn));
    assert_eq!(session.state(), VoiceState::Idle);
}

#[test]
fn test_explicit_stop_finalizes() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![]);
    session.activate(&mut input).unwrap();

    session.feed(&loud(600));
    let segment = session.stop_recording().expect("segment finalized");
    assert_eq!(segment.duration_ms(), 600);
    assert_eq!(session.state(), VoiceState::Thinking);
}

#[tokio::test]
async fn test_full_turn_through_driver() {
    let backend = CountingBackend::new("привет");
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![loud(300), quiet(500), quiet(500)]);
    let mut output = NullOutput;

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        let _ = tx.send(()).await;
    });

    run_session(&mut session, &mut input, &mut output, &*backend, "u1", &mut rx)
        .await
        .unwrap();

    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.converse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), VoiceState::Idle);
    assert!(!input.started);
}

/// Backend whose conversation call never completes
struct HangingBackend;

#[async_trait]
impl ConversationBackend for HangingBackend {
    async fn transcribe(&self, _wav: Vec<u8>) -> Result<String> {
        Ok("привет".to_string())
    }

    async fn converse(&self, _user_id: &str, _text: &str) -> Result<TurnReply> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_shutdown_aborts_inflight_turn() {
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![loud(300), quiet(500), quiet(500)]);
    let mut output = NullOutput;

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        let _ = tx.send(()).await;
    });

    // The conversation call hangs forever; shutdown must still tear the
    // session down promptly
    let result = tokio::time::timeout(
        Duration::from_secs(3),
        run_session(
            &mut session,
            &mut input,
            &mut output,
            &HangingBackend,
            "u1",
            &mut rx,
        ),
    )
    .await;

    result
        .expect("shutdown must interrupt a hung conversation")
        .unwrap();
    assert_eq!(session.state(), VoiceState::Idle);
    assert!(!input.started);
}

#[tokio::test]
async fn test_silence_never_reaches_language_model() {
    // Transcription of an all-silence segment comes back empty: the session
    // resumes listening without a conversation call
    let backend = CountingBackend::new("");
    let mut session = VoiceSession::new(ListenMode::Continuous, tuning(), SAMPLE_RATE);
    let mut input = ScriptedInput::new(vec![quiet(500), quiet(500)]);
    let mut output = NullOutput;

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        let _ = tx.send(()).await;
    });

    run_session(&mut session, &mut input, &mut output, &*backend, "u1", &mut rx)
        .await
        .unwrap();

    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.converse_calls.load(Ordering::SeqCst), 0);
}
