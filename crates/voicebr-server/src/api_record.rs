//! Inbound leg: caller authorization, recording instructions and the
//! recording-ready webhook that starts a broadcast.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::{Method, StatusCode},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use voicebr_nexmo::{load_whitelist, Action, AnswerRequest, Contact, ContactsError, RecordingEvent};

/// Query string of a non-POST answer webhook. Carries the same fields as
/// the POST body.
#[derive(Debug, Default, Deserialize)]
pub struct CallerQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub uuid: Option<String>,
    pub conversation_uuid: Option<String>,
}

/// Extracts the answer request: from the JSON body on POST, from the query
/// string otherwise. A request without a calling number is unauthorized.
pub fn caller_from_request(
    method: &Method,
    query: &CallerQuery,
    body: &[u8],
) -> Result<AnswerRequest, ApiError> {
    let request = if method == Method::POST {
        serde_json::from_slice::<AnswerRequest>(body).map_err(|e| {
            ApiError::Unauthorized(format!("unable to find calling number in request body: {}", e))
        })?
    } else {
        AnswerRequest {
            from: query.from.clone().unwrap_or_default(),
            to: query.to.clone(),
            uuid: query.uuid.clone(),
            conversation_uuid: query.conversation_uuid.clone(),
        }
    };

    if request.from.is_empty() {
        return Err(ApiError::Unauthorized(
            "unable to find calling number".to_string(),
        ));
    }
    Ok(request)
}

/// Handler for `GET|POST /record/voice/answer`.
///
/// The whitelist is decoded on every request so edits apply immediately.
pub async fn answer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallerQuery>,
    method: Method,
    body: Bytes,
) -> Result<Json<Vec<Action>>, ApiError> {
    let request = caller_from_request(&method, &query, &body).inspect_err(|e| {
        tracing::warn!("answer handler: {}", e);
    })?;
    let from = request.from.as_str();

    tracing::info!(
        from = %from,
        to = request.to.as_deref().unwrap_or(""),
        call = request.uuid.as_deref().unwrap_or(""),
        conversation = request.conversation_uuid.as_deref().unwrap_or(""),
        "authenticating caller"
    );
    let whitelist = match load_whitelist(state.storage.as_contact_source()).await {
        Ok(contacts) => contacts,
        Err(ContactsError::Partial {
            contacts,
            discarded,
        }) => {
            tracing::warn!(discarded, "whitelist contains corrupted rows");
            contacts
        }
        Err(e) => {
            tracing::error!("answer handler: unable to decode whitelist: {}", e);
            return Err(ApiError::InternalServerError(
                "unable to decode whitelist".to_string(),
            ));
        }
    };

    let caller: &Contact = whitelist
        .iter()
        .find(|contact| contact.number == from)
        .ok_or_else(|| {
            tracing::warn!(from = %from, "number cannot broadcast");
            ApiError::Unauthorized(format!("number {} cannot broadcast", from))
        })?;

    Ok(Json(state.prompts.record(&caller.name, &state.origin)))
}

/// Handler for `/store/recording/event`.
///
/// Streams the recording into storage, then starts the broadcast in the
/// background. Only a malformed event is reported back to the platform;
/// every later failure is logged and the cycle ends there. Methods other
/// than POST are acknowledged and ignored.
pub async fn store_recording_handler(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if method != Method::POST {
        return Ok(StatusCode::OK);
    }

    let event: RecordingEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("store recording handler: unable to decode recording event: {}", e);
        ApiError::BadRequest(format!("unable to decode recording event: {}", e))
    })?;

    let rec_name = event.file_name();
    tracing::info!(
        recording = %rec_name,
        conversation = event.conversation_uuid.as_deref().unwrap_or(""),
        "recording available"
    );

    let deadline = Instant::now() + state.download_timeout;
    let mut audio = match state.client.download(&event.recording_url, deadline).await {
        Ok(audio) => audio,
        Err(e) => {
            tracing::error!(
                url = %event.recording_url,
                "store recording handler: unable to download file: {}",
                e
            );
            return Ok(StatusCode::OK);
        }
    };

    let stored = tokio::time::timeout_at(
        deadline,
        state
            .storage
            .as_recording_store()
            .write_rec(&mut audio, &rec_name),
    )
    .await;
    match stored {
        Ok(Ok(path)) => {
            tracing::info!(path = %path.display(), "recording stored");
        }
        Ok(Err(e)) => {
            tracing::error!(recording = %rec_name, "store recording handler: {}", e);
            return Ok(StatusCode::OK);
        }
        Err(_) => {
            tracing::error!(
                recording = %rec_name,
                "store recording handler: download did not finish in time"
            );
            return Ok(StatusCode::OK);
        }
    }

    let storage = state.storage.clone();
    let broadcaster = state.broadcaster.clone();
    tokio::spawn(async move {
        if let Err(e) = broadcaster
            .broadcast(storage.as_contact_source(), &rec_name)
            .await
        {
            tracing::error!(recording = %rec_name, "unable to start broadcast: {}", e);
        }
    });

    Ok(StatusCode::OK)
}
