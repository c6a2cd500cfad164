//! TOML configuration file loading
//!
//! Supports `~/.config/sphere/gateway.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay beneath env vars.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Yandex SpeechKit credentials
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// GigaChat credentials and model
    #[serde(default)]
    pub gigachat: GigaChatFileConfig,

    /// Chat behavior
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Voice session tuning
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP listen port
    pub port: Option<u16>,

    /// Data directory for transcripts and session state
    pub data_dir: Option<String>,

    /// Static web UI directory
    pub static_dir: Option<String>,
}

/// Yandex SpeechKit credentials
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    pub api_key: Option<String>,
    pub folder_id: Option<String>,
}

/// GigaChat credentials and model
#[derive(Debug, Default, Deserialize)]
pub struct GigaChatFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Model identifier (e.g. "GigaChat")
    pub model: Option<String>,
}

/// Chat behavior
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// System instruction for spoken replies
    pub system_prompt: Option<String>,
}

/// Voice session tuning
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS voice identifier (e.g. "oksana")
    pub tts_voice: Option<String>,

    /// Mean-amplitude quiet threshold
    pub quiet_threshold: Option<f32>,

    /// Continuous quiet (ms) that ends a recording
    pub quiet_duration_ms: Option<u64>,

    /// Suppression window (ms) after submitting a segment
    pub submit_cooldown_ms: Option<u64>,

    /// Pause (ms) before listening resumes after a failed turn
    pub resume_delay_ms: Option<u64>,

    /// Upper bound (s) on waiting for a recognition result
    pub stt_watchdog_secs: Option<u64>,

    /// Segments shorter than this (ms) are discarded without transcription
    pub min_segment_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GatewayConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config_file() -> GatewayConfigFile {
    let Some(path) = config_file_path() else {
        return GatewayConfigFile::default();
    };

    if !path.exists() {
        return GatewayConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GatewayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GatewayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/sphere/gateway.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sphere").join("gateway.toml"))
}
