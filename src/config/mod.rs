//! Configuration management for the sphere gateway

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Spoken-output persona instruction sent ahead of every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "Ты — дружелюбный голосовой помощник. \
    Отвечай коротко, простыми разговорными фразами, без списков, таблиц и \
    разметки: твой ответ будет озвучен вслух.";

/// Canned reply used when the language model is unavailable
pub const FALLBACK_REPLY: &str = "Извини, ИИ сейчас недоступен.";

/// Default SpeechKit voice
pub const DEFAULT_TTS_VOICE: &str = "oksana";

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,

    /// Data directory (transcripts, local session state)
    pub data_dir: PathBuf,

    /// Optional static web UI directory
    pub static_dir: Option<PathBuf>,

    /// Yandex SpeechKit credentials (required)
    pub speech: SpeechConfig,

    /// GigaChat credentials; `None` degrades conversation to the fallback reply
    pub gigachat: Option<GigaChatConfig>,

    /// Default TTS voice
    pub tts_voice: String,

    /// System instruction for spoken replies
    pub system_prompt: String,

    /// Voice session tuning
    pub session: SessionTuning,
}

/// Yandex SpeechKit credentials
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub folder_id: String,
}

/// GigaChat credentials
#[derive(Debug, Clone)]
pub struct GigaChatConfig {
    pub client_id: String,
    pub client_secret: String,
    pub model: String,
}

/// Tuning knobs for the local voice session state machine
#[derive(Debug, Clone)]
pub struct SessionTuning {
    /// Mean-amplitude level below which a frame counts as quiet
    pub quiet_threshold: f32,

    /// Continuous quiet that ends a recording
    pub quiet_duration: Duration,

    /// Suppression window after submitting a segment
    pub submit_cooldown: Duration,

    /// Pause before listening resumes after an empty or failed turn
    pub resume_delay: Duration,

    /// Upper bound on waiting for a recognition result
    pub stt_watchdog: Duration,

    /// Segments shorter than this are discarded without transcription
    pub min_segment: Duration,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            quiet_threshold: 0.04,
            quiet_duration: Duration::from_millis(800),
            submit_cooldown: Duration::from_millis(600),
            resume_delay: Duration::from_millis(300),
            stt_watchdog: Duration::from_secs(10),
            min_segment: Duration::from_millis(500),
        }
    }
}

impl SessionTuning {
    /// Apply the TOML overlay over the defaults
    #[must_use]
    pub fn from_file(voice: &file::VoiceFileConfig) -> Self {
        let defaults = Self::default();
        Self {
            quiet_threshold: voice.quiet_threshold.unwrap_or(defaults.quiet_threshold),
            quiet_duration: voice
                .quiet_duration_ms
                .map_or(defaults.quiet_duration, Duration::from_millis),
            submit_cooldown: voice
                .submit_cooldown_ms
                .map_or(defaults.submit_cooldown, Duration::from_millis),
            resume_delay: voice
                .resume_delay_ms
                .map_or(defaults.resume_delay, Duration::from_millis),
            stt_watchdog: voice
                .stt_watchdog_secs
                .map_or(defaults.stt_watchdog, Duration::from_secs),
            min_segment: voice
                .min_segment_ms
                .map_or(defaults.min_segment, Duration::from_millis),
        }
    }
}

impl Config {
    /// Load configuration (env > TOML file > default)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the speech provider credentials are
    /// missing — the gateway must not serve requests without them
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        // Speech credentials are a hard startup requirement
        let api_key = std::env::var("YANDEX_API_KEY")
            .ok()
            .or(fc.speech.api_key)
            .ok_or_else(|| Error::Config("YANDEX_API_KEY is not set".to_string()))?;
        let folder_id = std::env::var("YANDEX_FOLDER_ID")
            .ok()
            .or(fc.speech.folder_id)
            .ok_or_else(|| Error::Config("YANDEX_FOLDER_ID is not set".to_string()))?;

        // GigaChat is optional: conversation degrades to the fallback reply
        let client_id = std::env::var("GIGACHAT_CLIENT_ID").ok().or(fc.gigachat.client_id);
        let client_secret = std::env::var("GIGACHAT_CLIENT_SECRET")
            .ok()
            .or(fc.gigachat.client_secret);
        let gigachat = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(GigaChatConfig {
                client_id,
                client_secret,
                model: fc.gigachat.model.unwrap_or_else(|| "GigaChat".to_string()),
            }),
            _ => {
                tracing::warn!(
                    "GigaChat credentials missing, conversation will use the fallback reply"
                );
                None
            }
        };

        let port = std::env::var("SPHERE_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(8080);

        let data_dir = std::env::var("SPHERE_DATA_DIR")
            .ok()
            .map(PathBuf::from)
            .or(fc.server.data_dir.map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        std::fs::create_dir_all(&data_dir)?;

        let static_dir = std::env::var("SPHERE_STATIC_DIR")
            .ok()
            .map(PathBuf::from)
            .or(fc.server.static_dir.map(PathBuf::from));

        let session = SessionTuning::from_file(&fc.voice);

        let tts_voice = std::env::var("SPHERE_TTS_VOICE")
            .ok()
            .or(fc.voice.tts_voice)
            .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string());

        Ok(Self {
            port,
            data_dir,
            static_dir,
            speech: SpeechConfig { api_key, folder_id },
            gigachat,
            tts_voice,
            system_prompt: fc
                .chat
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            session,
        })
    }

    /// Transcript storage directory: `<data_dir>/chats`
    #[must_use]
    pub fn chats_dir(&self) -> PathBuf {
        self.data_dir.join("chats")
    }
}

/// Default data directory: `~/.local/share/sphere/gateway` on Linux
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".sphere"),
        |d| d.data_dir().join("sphere").join("gateway"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_defaults_when_file_empty() {
        let tuning = SessionTuning::from_file(&file::VoiceFileConfig::default());

        assert!((tuning.quiet_threshold - 0.04).abs() < f32::EPSILON);
        assert_eq!(tuning.quiet_duration, Duration::from_millis(800));
        assert_eq!(tuning.min_segment, Duration::from_millis(500));
    }

    #[test]
    fn test_tuning_overlay_covers_every_knob() {
        let voice = file::VoiceFileConfig {
            quiet_threshold: Some(0.1),
            quiet_duration_ms: Some(1200),
            submit_cooldown_ms: Some(100),
            resume_delay_ms: Some(50),
            stt_watchdog_secs: Some(20),
            min_segment_ms: Some(250),
            ..Default::default()
        };

        let tuning = SessionTuning::from_file(&voice);
        assert!((tuning.quiet_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(tuning.quiet_duration, Duration::from_millis(1200));
        assert_eq!(tuning.submit_cooldown, Duration::from_millis(100));
        assert_eq!(tuning.resume_delay, Duration::from_millis(50));
        assert_eq!(tuning.stt_watchdog, Duration::from_secs(20));
        assert_eq!(tuning.min_segment, Duration::from_millis(250));
    }
}
