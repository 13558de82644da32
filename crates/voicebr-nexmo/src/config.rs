use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_api_base() -> String {
    "https://api.nexmo.com".to_string()
}

fn default_call_rate_per_sec() -> u32 {
    3
}

fn default_download_rate_per_sec() -> u32 {
    15
}

fn default_download_timeout_secs() -> u64 {
    60
}

/// Nexmo voice application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexmoConfig {
    /// Voice application id, sent as the `application_id` claim.
    #[serde(default)]
    pub application_id: String,
    /// PEM file with the application's RSA private key. Without it every
    /// outbound request fails with `TransportError::MissingKey`.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// Number outbound calls are placed from.
    #[serde(default)]
    pub number: String,
    /// Base URL of the voice API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Call-creation requests per second allowed by the platform.
    #[serde(default = "default_call_rate_per_sec")]
    pub call_rate_per_sec: u32,
    /// Recording downloads per second.
    #[serde(default = "default_download_rate_per_sec")]
    pub download_rate_per_sec: u32,
    /// Upper bound for a single recording download.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for NexmoConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            private_key_path: None,
            number: String::new(),
            api_base: default_api_base(),
            call_rate_per_sec: default_call_rate_per_sec(),
            download_rate_per_sec: default_download_rate_per_sec(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl NexmoConfig {
    pub fn new(application_id: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            number: number.into(),
            ..Default::default()
        }
    }

    /// Endpoint outbound calls are created on.
    pub fn calls_url(&self) -> String {
        format!("{}/v1/calls", self.api_base.trim_end_matches('/'))
    }
}
