//! External speech and language-model providers
//!
//! The HTTP handlers talk to providers through the three traits below so the
//! upstream services (GigaChat for chat, Yandex SpeechKit for STT/TTS) can be
//! replaced by stubs in tests.

mod gigachat;
mod speechkit;

pub use gigachat::GigaChat;
pub use speechkit::SpeechKit;

use async_trait::async_trait;

use crate::transcript::Utterance;
use crate::Result;

/// Chat-completion provider
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce an assistant reply for the given system instruction and
    /// conversation history
    async fn complete(&self, system_prompt: &str, history: &[Utterance]) -> Result<String>;
}

/// Speech-to-text provider
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe compressed audio; empty text is a valid "no speech" result
    async fn recognize(&self, audio: Vec<u8>) -> Result<String>;
}

/// Text-to-speech provider
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech, returning MP3 bytes
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}
