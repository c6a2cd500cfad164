//! Yandex SpeechKit speech-to-text and text-to-speech

use async_trait::async_trait;
use serde::Deserialize;

use super::{SpeechRecognizer, SpeechSynthesizer};
use crate::{Error, Result};

const STT_URL: &str = "https://stt.api.cloud.yandex.net/speech/v1/stt:recognize";
const TTS_URL: &str = "https://tts.api.cloud.yandex.net/speech/v1/tts:synthesize";

/// Yandex SpeechKit client (one API key covers both directions)
pub struct SpeechKit {
    client: reqwest::Client,
    api_key: String,
    folder_id: String,
}

/// Recognition response: either a result or an error envelope
#[derive(Deserialize)]
struct RecognizeResponse {
    result: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

impl SpeechKit {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns error if the API key or folder ID is empty
    pub fn new(api_key: String, folder_id: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Yandex API key required".to_string()));
        }
        if folder_id.is_empty() {
            return Err(Error::Config("Yandex folder ID required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            folder_id,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechKit {
    async fn recognize(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting recognition");

        let response = self
            .client
            .post(STT_URL)
            .query(&[("folderId", self.folder_id.as_str())])
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "SpeechKit STT error");
            return Err(Error::Stt(format!("SpeechKit error {status}: {body}")));
        }

        let result: RecognizeResponse = response.json().await?;
        if let Some(code) = result.error_code {
            let message = result.error_message.unwrap_or_default();
            return Err(Error::Stt(format!("SpeechKit {code}: {message}")));
        }

        let text = result.result.unwrap_or_default();
        tracing::info!(transcript = %text, "recognition complete");
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechKit {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), voice, "starting synthesis");

        let response = self
            .client
            .post(TTS_URL)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .form(&[("text", text), ("voice", voice), ("format", "mp3")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "SpeechKit TTS error");
            return Err(Error::Tts(format!("SpeechKit error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
