//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::chat::{bad_request, ErrorResponse};
use super::ApiState;

/// Standalone synthesis request
#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
}

/// Standalone synthesis response
#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio: String,
}

/// Synthesize text to speech, returning base64 MP3
pub async fn tts(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.text.trim().is_empty() {
        return Err(bad_request("no text to synthesize"));
    }

    let voice = request.voice.as_deref().unwrap_or(&state.default_voice);

    match state.synthesizer.synthesize(&request.text, voice).await {
        Ok(bytes) => Ok(Json(TtsResponse {
            audio: STANDARD.encode(bytes),
        })),
        Err(e) => {
            tracing::error!(error = %e, "standalone synthesis failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "speech synthesis failed".to_string(),
                }),
            ))
        }
    }
}

/// Transcription response
///
/// Upstream recognizer failures are absorbed to empty text: the client
/// treats it as "no speech detected" and resumes listening.
#[derive(Debug, Serialize)]
pub struct SttResponse {
    pub text: String,
}

/// Transcribe an uploaded audio file
pub async fn stt(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<SttResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut audio: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if let Ok(bytes) = field.bytes().await {
            if !bytes.is_empty() {
                audio = Some(bytes.to_vec());
                break;
            }
        }
    }

    let Some(audio) = audio else {
        return Err(bad_request("no audio file"));
    };

    let text = match state.recognizer.recognize(audio).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "recognition failed, returning empty text");
            String::new()
        }
    };

    Ok(Json(SttResponse { text }))
}
