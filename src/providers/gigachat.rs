//! GigaChat chat-completion provider
//!
//! Two-step flow: a client-credentials OAuth token fetch, then the chat
//! completion. The Sberbank endpoints present a self-signed certificate
//! chain, so this client accepts invalid certs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ChatModel;
use crate::transcript::{Role, Utterance};
use crate::{Error, Result};

const OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const COMPLETIONS_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";
const OAUTH_SCOPE: &str = "GIGACHAT_API_PERS";

/// GigaChat client
pub struct GigaChat {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    model: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    repetition_penalty: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl GigaChat {
    /// Create a client from OAuth client credentials
    ///
    /// # Errors
    ///
    /// Returns error if credentials are empty or the HTTP client cannot be
    /// built
    pub fn new(client_id: String, client_secret: String, model: String) -> Result<Self> {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(Error::Config(
                "GigaChat client credentials required".to_string(),
            ));
        }

        // The oauth and completion hosts use a non-public CA
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            model,
        })
    }

    /// Fetch a short-lived access token via client credentials
    async fn access_token(&self) -> Result<String> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let rq_uid = uuid::Uuid::new_v4().to_string();

        let response = self
            .client
            .post(OAUTH_URL)
            .header("Authorization", format!("Basic {basic}"))
            .header("RqUID", rq_uid)
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials"), ("scope", OAUTH_SCOPE)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("GigaChat oauth error {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ChatModel for GigaChat {
    async fn complete(&self, system_prompt: &str, history: &[Utterance]) -> Result<String> {
        let token = self.access_token().await?;

        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: system_prompt,
            });
        }
        for utterance in history {
            messages.push(WireMessage {
                role: match utterance.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &utterance.content,
            });
        }

        let request = CompletionRequest {
            model: &self.model,
            messages,
            stream: false,
            repetition_penalty: 1.0,
        };

        tracing::debug!(turns = history.len(), "sending chat completion");

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {token}"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("GigaChat error {status}: {body}")));
        }

        let completion: CompletionResponse = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Chat("completion returned no choices".to_string()))?;

        tracing::info!(chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}
