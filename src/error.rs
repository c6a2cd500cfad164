//! Error types for the sphere gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the sphere gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credentials, bad paths)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio capture/playback device error
    #[error("audio device error: {0}")]
    Device(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat model error
    #[error("chat error: {0}")]
    Chat(String),

    /// Transcript persistence error
    #[error("transcript error: {0}")]
    Transcript(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
