//! Webhook server for the voice broadcast engine.
//!
//! Routes the voice platform's webhooks to the recording and playback
//! handlers. The platform's own calls are not authenticated; the server
//! trusts them by network position.

pub mod api;
pub mod api_play;
pub mod api_record;
pub mod config;

use axum::{
    routing::{any, get},
    Extension, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use voicebr_nexmo::{Broadcaster, NexmoClient, Prompts};
use voicebr_storage::Storage;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Directories and recordings.
    pub storage: Arc<dyn Storage>,
    /// Client used to download recordings.
    pub client: Arc<NexmoClient>,
    /// Fans stored recordings out to the broadcast list.
    pub broadcaster: Broadcaster,
    /// Text and voice of the generated instructions.
    pub prompts: Prompts,
    /// The public URL of the server, used in every callback URL.
    pub origin: String,
    /// Upper bound on fetching one recording from the platform.
    pub download_timeout: Duration,
}

/// Builds the application router with all routes.
///
/// Webhooks accept every method: the platform can be configured to call
/// them with GET or POST, and anything else is acknowledged.
pub fn app(state: AppState) -> Router {
    // Served with range and conditional request support.
    let recordings_dir = state.storage.as_recording_store().recordings_dir();
    tracing::info!(path = %recordings_dir.display(), "serving recordings at /static");

    Router::new()
        .route("/health", get(api::health))
        .route("/record/voice/answer", any(api_record::answer_handler))
        .route("/record/voice/event", any(api::log_event_handler))
        .route(
            "/store/recording/event",
            any(api_record::store_recording_handler),
        )
        .route("/play/recording/event", any(api::log_event_handler))
        .route(
            "/play/recording/{name}",
            any(api_play::play_recording_handler),
        )
        .nest_service("/static", ServeDir::new(recordings_dir))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
