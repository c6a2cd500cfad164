//! Local voice session: state machine plus the async driver
//!
//! The controller (state machine) is synchronous; `run_session` drives it on
//! a fixed 100ms tick, draining capture frames and running one conversation
//! turn at a time against a [`ConversationBackend`].

mod client;
mod controller;

pub use client::GatewayClient;
pub use controller::{ListenMode, VoiceSession, VoiceState};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::voice::{AudioInput, AudioOutput, AudioSegment};
use crate::Result;

/// Result of one conversation turn
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    /// MP3 bytes; `None` when synthesis failed (playback is skipped)
    pub audio: Option<Vec<u8>>,
}

/// The transcription and conversation operations a session needs
///
/// Implemented by [`GatewayClient`] over HTTP and by stubs in tests.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Transcribe a WAV-encoded segment; empty text means "no speech"
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;

    /// Run one conversation turn for the given user
    async fn converse(&self, user_id: &str, text: &str) -> Result<TurnReply>;
}

/// Drive an activated session until shutdown
///
/// The tick only drains already-buffered capture data; a finalized segment
/// runs its turn raced against the shutdown channel, so there is never more
/// than one outstanding chain and a hung provider call cannot block
/// deactivation: dropping the turn future aborts the network request, and
/// deactivation invalidates its turn token.
///
/// # Errors
///
/// Returns error if the session cannot be activated
pub async fn run_session(
    session: &mut VoiceSession,
    input: &mut dyn AudioInput,
    playback: &mut dyn AudioOutput,
    backend: &dyn ConversationBackend,
    user_id: &str,
    shutdown: &mut mpsc::Receiver<()>,
) -> Result<()> {
    session.activate(input)?;

    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = tick.tick() => {
                let frames = input.take_frames();
                let Some(segment) = session.feed(&frames) else { continue };
                let turn = session.current_turn();

                let aborted = tokio::select! {
                    _ = shutdown.recv() => true,
                    () = run_turn(session, playback, backend, user_id, segment, turn) => false,
                };
                if aborted {
                    tracing::info!("shutdown requested, aborting turn");
                    break;
                }
                // Frames captured while the turn ran belong to nobody
                input.take_frames();
            }
        }
    }

    playback.request_stop();
    session.deactivate(input);
    Ok(())
}

/// Run one turn: transcribe, converse, speak
///
/// Transient network failures log and fall back to Listening after a short
/// delay; the session self-heals without losing transcript history.
async fn run_turn(
    session: &mut VoiceSession,
    playback: &mut dyn AudioOutput,
    backend: &dyn ConversationBackend,
    user_id: &str,
    segment: AudioSegment,
    turn: u64,
) {
    let resume_delay = session.tuning().resume_delay;
    let watchdog = session.tuning().stt_watchdog;

    let wav = match segment.to_wav() {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!(error = %e, "segment encoding failed");
            session.turn_done(turn);
            return;
        }
    };

    // The watchdog bounds how long we wait on the recognizer; a stall forces
    // a return to Listening rather than hanging the session
    let text = match tokio::time::timeout(watchdog, backend.transcribe(wav)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "transcription failed, resuming");
            tokio::time::sleep(resume_delay).await;
            session.turn_done(turn);
            return;
        }
        Err(_) => {
            tracing::warn!("transcription watchdog expired, resuming");
            session.turn_done(turn);
            return;
        }
    };

    let text = text.trim();
    if text.is_empty() {
        // Silence or noise: skip the language model entirely
        tracing::debug!("empty transcription, resuming");
        session.turn_done(turn);
        return;
    }

    tracing::info!(text, "utterance recognized");

    match backend.converse(user_id, text).await {
        Ok(reply) => {
            tracing::info!(reply = %reply.reply, "assistant replied");
            if let Some(audio) = reply.audio {
                if session.begin_speaking(turn) {
                    if let Err(e) = playback.play_mp3(&audio).await {
                        tracing::warn!(error = %e, "playback failed");
                    }
                }
            }
            session.turn_done(turn);
        }
        Err(e) => {
            tracing::warn!(error = %e, "conversation failed, resuming");
            tokio::time::sleep(resume_delay).await;
            session.turn_done(turn);
        }
    }
}
