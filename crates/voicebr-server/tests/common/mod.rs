//! Shared setup: a stand-in voice platform and a server wired to it.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;
use voicebr_nexmo::{
    parse_signing_key, BroadcastConfig, Broadcaster, Limiters, NexmoClient, NexmoConfig, Prompts,
};
use voicebr_server::{app, AppState};
use voicebr_storage::{LocalStorage, BROADCAST_LIST_FILE, WHITELIST_FILE};

pub const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/private.pem");
pub const ORIGIN: &str = "https://voice.example.org";

#[derive(Default)]
struct Platform {
    calls: Mutex<Vec<Value>>,
    recordings: HashMap<String, Vec<u8>>,
}

/// Records created calls and serves recordings at `/v1/files/{id}`.
pub struct MockPlatform {
    pub base_url: String,
    inner: Arc<Platform>,
}

impl MockPlatform {
    pub async fn start(recordings: &[(&str, &[u8])]) -> Self {
        let inner = Arc::new(Platform {
            calls: Mutex::new(Vec::new()),
            recordings: recordings
                .iter()
                .map(|(id, data)| (id.to_string(), data.to_vec()))
                .collect(),
        });
        let router = Router::new()
            .route("/v1/calls", post(create_call))
            .route("/v1/files/{id}", get(download))
            .with_state(inner.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            inner,
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Polls until `n` calls arrived or five seconds passed.
    pub async fn wait_for_calls(&self, n: usize) -> Vec<Value> {
        for _ in 0..250 {
            let calls = self.calls();
            if calls.len() >= n {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.calls()
    }
}

async fn create_call(State(inner): State<Arc<Platform>>, Json(body): Json<Value>) -> StatusCode {
    inner.calls.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn download(
    State(inner): State<Arc<Platform>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match inner.recordings.get(&id) {
        Some(data) => (StatusCode::OK, data.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A server over a temporary storage root.
pub struct TestServer {
    pub app: Router,
    pub dir: TempDir,
}

impl TestServer {
    pub fn new(platform: &MockPlatform) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut config = NexmoConfig::new("app-123", "+390000");
        config.api_base = platform.base_url.clone();
        let client = Arc::new(NexmoClient::new(
            &config,
            ORIGIN,
            Some(parse_signing_key(PRIVATE_KEY).unwrap()),
            Limiters::new(100, 100),
        ));

        let state = AppState {
            storage: Arc::new(LocalStorage::new(dir.path())),
            client: client.clone(),
            broadcaster: Broadcaster::new(client, BroadcastConfig::default()),
            prompts: Prompts::default(),
            origin: ORIGIN.to_string(),
            download_timeout: Duration::from_secs(5),
        };

        Self {
            app: app(state),
            dir,
        }
    }

    pub fn with_whitelist(self, contents: &str) -> Self {
        std::fs::write(self.dir.path().join(WHITELIST_FILE), contents).unwrap();
        self
    }

    pub fn with_broadcast_list(self, contents: &str) -> Self {
        std::fs::write(self.dir.path().join(BROADCAST_LIST_FILE), contents).unwrap();
        self
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, Bytes) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
