use crate::config::NexmoConfig;
use crate::error::TransportError;
use crate::rate_limit::RateLimiter;
use futures_util::{StreamExt, TryStreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header, Method, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// The two request classes the platform throttles separately.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Gates call creation (`post`).
    pub calls: Arc<RateLimiter>,
    /// Gates downloads (`get`).
    pub downloads: Arc<RateLimiter>,
}

impl Limiters {
    pub fn new(calls_per_sec: u32, downloads_per_sec: u32) -> Self {
        Self {
            calls: Arc::new(RateLimiter::new(calls_per_sec)),
            downloads: Arc::new(RateLimiter::new(downloads_per_sec)),
        }
    }

    pub fn from_config(config: &NexmoConfig) -> Self {
        Self::new(config.call_rate_per_sec, config.download_rate_per_sec)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    application_id: &'a str,
    iat: i64,
    jti: String,
}

/// Parses a PEM encoded RSA private key.
pub fn parse_signing_key(pem: &[u8]) -> Result<EncodingKey, TransportError> {
    EncodingKey::from_rsa_pem(pem).map_err(TransportError::InvalidKey)
}

/// Reads and parses the private key at `path`.
pub fn load_signing_key(path: &Path) -> Result<EncodingKey, TransportError> {
    let pem = std::fs::read(path).map_err(|source| TransportError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_signing_key(&pem)
}

/// Authenticated, rate-limited client for the voice API.
///
/// Every request carries a freshly signed application token; nothing is
/// cached between requests, so the client is safe to share across any
/// number of concurrent calls.
pub struct NexmoClient {
    http: reqwest::Client,
    key: Option<EncodingKey>,
    application_id: String,
    number: String,
    origin: String,
    calls_url: String,
    limiters: Limiters,
}

impl fmt::Debug for NexmoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NexmoClient")
            .field("application_id", &self.application_id)
            .field("number", &self.number)
            .field("origin", &self.origin)
            .field("calls_url", &self.calls_url)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl NexmoClient {
    /// `origin` is this server's externally reachable base URL; callback
    /// URLs handed to the platform are built from it.
    pub fn new(
        config: &NexmoConfig,
        origin: impl Into<String>,
        key: Option<EncodingKey>,
        limiters: Limiters,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            key,
            application_id: config.application_id.clone(),
            number: config.number.clone(),
            origin: origin.into(),
            calls_url: config.calls_url(),
            limiters,
        }
    }

    /// Builds a client, loading the signing key from `private_key_path` if
    /// one is configured.
    pub fn from_config(
        config: &NexmoConfig,
        origin: impl Into<String>,
        limiters: Limiters,
    ) -> Result<Self, TransportError> {
        let key = match &config.private_key_path {
            Some(path) => Some(load_signing_key(path)?),
            None => {
                tracing::warn!("no private key configured, outbound requests will fail");
                None
            }
        };
        Ok(Self::new(config, origin, key, limiters))
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn calls_url(&self) -> &str {
        &self.calls_url
    }

    /// Call-creation requests per second.
    pub fn call_rate(&self) -> u32 {
        self.limiters.calls.per_second()
    }

    /// Signs a new application token (RS256, with `application_id`, `iat`
    /// and a unique `jti`).
    pub fn token(&self) -> Result<String, TransportError> {
        let key = self.key.as_ref().ok_or(TransportError::MissingKey)?;
        let claims = Claims {
            application_id: &self.application_id,
            iat: chrono::Utc::now().timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(TransportError::Signing)
    }

    /// Authenticated GET, gated by the download limiter.
    pub async fn get(&self, url: &str, deadline: Instant) -> Result<Response, TransportError> {
        self.limiters.downloads.wait(deadline).await?;
        self.send(Method::GET, url, None, deadline).await
    }

    /// Authenticated JSON POST, gated by the call limiter.
    pub async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        deadline: Instant,
    ) -> Result<Response, TransportError> {
        self.limiters.calls.wait(deadline).await?;
        self.send(Method::POST, url, Some(body), deadline).await
    }

    /// Authenticated GET whose body is handed back as a byte stream, so a
    /// recording can be copied to storage without holding it in memory.
    ///
    /// The deadline covers the rate wait and the response headers; the
    /// caller bounds reading the body.
    pub async fn download(
        &self,
        url: &str,
        deadline: Instant,
    ) -> Result<impl AsyncRead + Send + Unpin + 'static, TransportError> {
        let response = self.get(url, deadline).await?;
        let body = response.bytes_stream().map_err(io::Error::other).boxed();
        Ok(StreamReader::new(body))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        deadline: Instant,
    ) -> Result<Response, TransportError> {
        let token = self.token()?;

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = tokio::time::timeout_at(deadline, request.send())
            .await
            .map_err(|_| TransportError::DeadlineExceeded)??;
        check_status(response)
    }
}

/// The platform answers 200 or 201 on success; anything else is a failure.
fn check_status(response: Response) -> Result<Response, TransportError> {
    match response.status() {
        StatusCode::OK | StatusCode::CREATED => Ok(response),
        status => Err(TransportError::RequestFailed {
            status: status.to_string(),
        }),
    }
}
