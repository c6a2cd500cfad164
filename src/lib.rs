//! Sphere Gateway - voice chatbot gateway
//!
//! This library provides the core functionality for the sphere gateway:
//! - The Speech Bridge HTTP API relaying STT/LLM/TTS provider calls
//! - Per-user flat-file chat transcripts
//! - A local voice session (capture, VAD, playback) with the
//!   listening→thinking→speaking state machine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  Clients                         │
//! │    Web UI (sphere)   │   Local voice session     │
//! └───────────────┬──────────────────────────────────┘
//!                 │ HTTP
//! ┌───────────────▼──────────────────────────────────┐
//! │               Speech Bridge                      │
//! │   /api/stt  │  /api/sendMessage  │  /api/tts     │
//! └───────────────┬──────────────────────────────────┘
//!                 │
//! ┌───────────────▼──────────────────────────────────┐
//! │   Yandex SpeechKit (STT/TTS)  │  GigaChat (LLM)  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod transcript;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{ConversationBackend, GatewayClient, ListenMode, VoiceSession, VoiceState};
pub use transcript::{Role, Transcript, TranscriptStore, Utterance};
pub use voice::{AudioCapture, AudioInput, AudioOutput, AudioPlayback, AudioSegment};
