//! HTTP API server for the sphere gateway

pub mod chat;
pub mod health;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::providers::{ChatModel, SpeechRecognizer, SpeechSynthesizer};
use crate::transcript::TranscriptStore;
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    /// Per-user transcript persistence
    pub store: TranscriptStore,

    /// Chat provider; `None` means degraded mode (fallback reply only)
    pub chat: Option<Arc<dyn ChatModel>>,

    /// Speech-to-text provider
    pub recognizer: Arc<dyn SpeechRecognizer>,

    /// Text-to-speech provider
    pub synthesizer: Arc<dyn SpeechSynthesizer>,

    /// System instruction prepended to every conversation
    pub system_prompt: String,

    /// TTS voice used when the request doesn't specify one
    pub default_voice: String,
}

/// Build the gateway router
#[must_use]
pub fn router(state: Arc<ApiState>, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/sendMessage", post(chat::send_message))
        .route("/api/tts", post(voice::tts))
        .route("/api/stt", post(voice::stt))
        .route("/api/speechToText", post(voice::stt))
        .route("/health", get(health::health))
        .with_state(state);

    if let Some(dir) = static_dir {
        tracing::info!(dir = %dir.display(), "serving static files");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Serve the API until the process is interrupted
///
/// # Errors
///
/// Returns error if the listener cannot bind
pub async fn serve(state: Arc<ApiState>, port: u16, static_dir: Option<PathBuf>) -> Result<()> {
    let app = router(state, static_dir);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}
