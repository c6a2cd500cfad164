//! Conversation turn endpoint
//!
//! `POST /api/sendMessage` runs one full turn: append the user utterance,
//! call the chat model, append the reply, synthesize audio. Provider
//! failures are absorbed: the model falls back to a canned reply and a TTS
//! failure drops the audio field, so the turn always completes with 200.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::config::FALLBACK_REPLY;
use crate::transcript::Utterance;

/// Conversation turn request
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub message: String,
    pub voice: Option<String>,
}

/// Conversation turn response; `audio` is null when synthesis failed
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub reply: String,
    pub audio: Option<String>,
}

/// Request validation error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Run one conversation turn
pub async fn send_message(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.user_id.trim().is_empty() || request.message.trim().is_empty() {
        return Err(bad_request("userId and message are required"));
    }

    let user_id = request.user_id.as_str();

    // A corrupt history file must not brick the user: log and start over
    let mut history = state.store.read(user_id).unwrap_or_else(|e| {
        tracing::warn!(user_id, error = %e, "unreadable history, starting fresh");
        Vec::new()
    });

    history.push(Utterance::user(request.message.clone()));

    // The user utterance must be durable before the model call, so a crash
    // mid-turn never silently drops it from history
    if let Err(e) = state.store.write(user_id, &history) {
        tracing::error!(user_id, error = %e, "failed to persist user utterance");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "failed to persist history".to_string(),
            }),
        ));
    }

    let reply = match &state.chat {
        Some(chat) => match chat.complete(&state.system_prompt, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "chat model failed, using fallback");
                FALLBACK_REPLY.to_string()
            }
        },
        None => FALLBACK_REPLY.to_string(),
    };

    history.push(Utterance::assistant(reply.clone()));
    if let Err(e) = state.store.write(user_id, &history) {
        // The reply still goes out; the next turn rewrites the file anyway
        tracing::error!(user_id, error = %e, "failed to persist assistant utterance");
    }

    let voice = request.voice.as_deref().unwrap_or(&state.default_voice);
    let audio = match state.synthesizer.synthesize(&reply, voice).await {
        Ok(bytes) => Some(STANDARD.encode(bytes)),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "synthesis failed, omitting audio");
            None
        }
    };

    tracing::info!(
        user_id,
        turns = history.len() / 2,
        has_audio = audio.is_some(),
        "turn complete"
    );

    Ok(Json(SendMessageResponse { reply, audio }))
}

pub(super) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}
