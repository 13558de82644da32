//! Webhook payloads and the callback URLs handed to the platform.

use crate::ncco::REC_FORMAT;
use serde::Deserialize;

/// Body of an answer webhook. Only the caller is needed here.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub conversation_uuid: Option<String>,
}

/// Body of the event posted once a recording is available for download.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingEvent {
    pub recording_url: String,
    pub recording_uuid: String,
    #[serde(default)]
    pub conversation_uuid: Option<String>,
}

impl RecordingEvent {
    /// Name the recording is stored and served under.
    pub fn file_name(&self) -> String {
        recording_file_name(&self.recording_uuid)
    }
}

pub fn recording_file_name(recording_uuid: &str) -> String {
    format!("{}.{}", recording_uuid, REC_FORMAT)
}

fn join(origin: &str, path: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), path)
}

/// Where the platform reports finished recordings.
pub fn store_recording_event_url(origin: &str) -> String {
    join(origin, "/store/recording/event")
}

/// Answer webhook of an outbound leg playing `rec_name`.
pub fn play_recording_url(origin: &str, rec_name: &str) -> String {
    join(origin, &format!("/play/recording/{}", rec_name))
}

/// Event webhook of outbound legs.
pub fn play_recording_event_url(origin: &str) -> String {
    join(origin, "/play/recording/event")
}

/// Public URL the platform streams `rec_name` from.
pub fn static_url(origin: &str, rec_name: &str) -> String {
    join(origin, &format!("/static/{}", rec_name))
}
