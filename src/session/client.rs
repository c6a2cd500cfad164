//! HTTP client for the gateway's own API
//!
//! The local voice session talks to a running gateway exactly like the web
//! client does: multipart upload for STT, JSON for the conversation turn.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::{ConversationBackend, TurnReply};
use crate::{Error, Result};

/// Client for the gateway HTTP API
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    voice: String,
}

#[derive(Deserialize)]
struct SttResponse {
    text: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    message: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    reply: String,
    audio: Option<String>,
}

impl GatewayClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8080`)
    #[must_use]
    pub fn new(base_url: impl Into<String>, voice: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            http: reqwest::Client::new(),
            base_url,
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl ConversationBackend for GatewayClient {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .http
            .post(format!("{}/api/stt", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("gateway STT error {status}: {body}")));
        }

        let result: SttResponse = response.json().await?;
        Ok(result.text)
    }

    async fn converse(&self, user_id: &str, text: &str) -> Result<TurnReply> {
        let request = SendMessageRequest {
            user_id,
            message: text,
            voice: &self.voice,
        };

        let response = self
            .http
            .post(format!("{}/api/sendMessage", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("gateway error {status}: {body}")));
        }

        let result: SendMessageResponse = response.json().await?;
        let audio = match result.audio {
            Some(b64) => Some(
                STANDARD
                    .decode(b64)
                    .map_err(|e| Error::Tts(format!("bad audio encoding: {e}")))?,
            ),
            None => None,
        };

        Ok(TurnReply {
            reply: result.reply,
            audio,
        })
    }
}
