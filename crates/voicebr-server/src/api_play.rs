//! Outbound legs: playback instructions. The recordings they stream are
//! served from the recordings directory under `/static`.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use std::sync::Arc;
use voicebr_nexmo::Action;

/// Handler for `/play/recording/{name}`.
pub async fn play_recording_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<Vec<Action>> {
    tracing::info!(recording = %name, "outbound call answered");
    Json(state.prompts.playback(&name, &state.origin))
}
