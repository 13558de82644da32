//! In-process stand-in for the voice platform.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use voicebr_nexmo::{parse_signing_key, Limiters, NexmoClient, NexmoConfig};
use voicebr_storage::{ContactSource, StorageError};

pub const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/private.pem");

/// A request the mock platform received.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Received {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body should be JSON")
    }

    /// Number the call was placed to.
    pub fn to_number(&self) -> String {
        self.json()["to"][0]["number"]
            .as_str()
            .expect("to[0].number")
            .to_string()
    }
}

#[derive(Default)]
struct Inner {
    received: Mutex<Vec<Received>>,
    failing_numbers: HashSet<String>,
    recordings: HashMap<String, Vec<u8>>,
    status_override: Option<StatusCode>,
}

#[derive(Clone)]
pub struct MockPlatform {
    pub base_url: String,
    inner: Arc<Inner>,
}

#[derive(Default)]
pub struct MockPlatformBuilder {
    inner: Inner,
}

impl MockPlatformBuilder {
    /// Calls to `number` are answered with 500.
    pub fn failing(mut self, number: &str) -> Self {
        self.inner.failing_numbers.insert(number.to_string());
        self
    }

    /// Served at `GET /v1/files/{id}`.
    pub fn recording(mut self, id: &str, data: &[u8]) -> Self {
        self.inner.recordings.insert(id.to_string(), data.to_vec());
        self
    }

    /// Every call creation is answered with `status`.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.inner.status_override = Some(status);
        self
    }

    pub async fn start(self) -> MockPlatform {
        let inner = Arc::new(self.inner);
        let app = Router::new()
            .route("/v1/calls", post(create_call))
            .route("/v1/files/{id}", get(download))
            .route("/slow", get(slow))
            .with_state(inner.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockPlatform {
            base_url: format!("http://{}", addr),
            inner,
        }
    }
}

impl MockPlatform {
    pub fn builder() -> MockPlatformBuilder {
        MockPlatformBuilder::default()
    }

    pub fn received(&self) -> Vec<Received> {
        self.inner.received.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.path == "/v1/calls")
            .collect()
    }

    pub fn config(&self) -> NexmoConfig {
        let mut config = NexmoConfig::new("app-123", "+390000");
        config.api_base = self.base_url.clone();
        config
    }

    /// A signed client pointed at this platform with generous limits.
    pub fn client(&self) -> NexmoClient {
        NexmoClient::new(
            &self.config(),
            "https://voice.example.org",
            Some(parse_signing_key(PRIVATE_KEY).unwrap()),
            Limiters::new(100, 100),
        )
    }
}

fn record(inner: &Inner, path: String, headers: &HeaderMap, body: Bytes) {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    inner.received.lock().unwrap().push(Received {
        path,
        authorization: value(header::AUTHORIZATION),
        content_type: value(header::CONTENT_TYPE),
        body,
    });
}

async fn create_call(
    State(inner): State<Arc<Inner>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    record(&inner, "/v1/calls".to_string(), &headers, body.clone());

    if let Some(status) = inner.status_override {
        return (status, Json(serde_json::json!({}))).into_response();
    }

    let to = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["to"][0]["number"].as_str().map(str::to_string))
        .unwrap_or_default();
    if inner.failing_numbers.contains(&to) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "title": "boom" })),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "uuid": uuid_like(&to), "status": "started" })),
    )
        .into_response()
}

fn uuid_like(seed: &str) -> String {
    format!("call-{}", seed.trim_start_matches('+'))
}

async fn download(
    State(inner): State<Arc<Inner>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record(&inner, format!("/v1/files/{}", id), &headers, Bytes::new());
    match inner.recordings.get(&id) {
        Some(data) => (StatusCode::OK, data.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

/// Contact directories held in memory.
pub struct StaticContacts {
    pub whitelist: Option<Vec<u8>>,
    pub broadcast_list: Option<Vec<u8>>,
}

impl StaticContacts {
    pub fn broadcast(list: &str) -> Self {
        Self {
            whitelist: None,
            broadcast_list: Some(list.as_bytes().to_vec()),
        }
    }

    pub fn empty() -> Self {
        Self {
            whitelist: None,
            broadcast_list: None,
        }
    }
}

#[async_trait]
impl ContactSource for StaticContacts {
    async fn read_whitelist(&self) -> Result<Vec<u8>, StorageError> {
        self.whitelist
            .clone()
            .ok_or_else(|| StorageError::NotFound("whitelist.csv".into()))
    }

    async fn read_broadcast_list(&self) -> Result<Vec<u8>, StorageError> {
        self.broadcast_list
            .clone()
            .ok_or_else(|| StorageError::NotFound("broadcast.csv".into()))
    }
}
