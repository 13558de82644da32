//! Fan-out of a stored recording to the broadcast list.
//!
//! One task per contact, no worker cap. The shared call limiter inside
//! [`NexmoClient`] is the only thing throttling them. Every call carries its
//! own deadline; a failure is logged and never touches sibling calls.

use crate::client::NexmoClient;
use crate::contacts::{load_broadcast_list, Contact};
use crate::error::{CallError, ContactsError};
use crate::webhook;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use voicebr_storage::ContactSource;

fn default_deadline_multiplier_secs() -> u64 {
    2
}

/// Per-call deadline policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Seconds granted per batch of `call_rate` contacts.
    #[serde(default = "default_deadline_multiplier_secs")]
    pub deadline_multiplier_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            deadline_multiplier_secs: default_deadline_multiplier_secs(),
        }
    }
}

impl BroadcastConfig {
    /// `max(1, contacts / call_rate) * deadline_multiplier_secs` seconds:
    /// about twice what the limiter needs to drain the whole batch with the
    /// default multiplier.
    pub fn call_deadline(&self, contacts: usize, call_rate: u32) -> Duration {
        let rate = call_rate.max(1) as usize;
        let batches = (contacts / rate).max(1) as u64;
        Duration::from_secs(batches.saturating_mul(self.deadline_multiplier_secs))
    }
}

/// Outbound call creation request.
#[derive(Debug, Serialize)]
pub struct CallRequest<'a> {
    pub to: [&'a Contact; 1],
    pub from: Contact,
    pub answer_url: [String; 1],
    pub event_url: [String; 1],
}

/// A single outbound leg.
#[derive(Debug, Clone)]
pub struct CallTask {
    pub contact: Contact,
    pub recording_name: String,
    pub deadline: Duration,
}

impl CallTask {
    pub fn request<'a>(&'a self, client: &NexmoClient) -> CallRequest<'a> {
        CallRequest {
            to: [&self.contact],
            from: Contact::phone(client.number()),
            answer_url: [webhook::play_recording_url(
                client.origin(),
                &self.recording_name,
            )],
            event_url: [webhook::play_recording_event_url(client.origin())],
        }
    }

    /// Places the call. The deadline bounds both the wait for a rate token
    /// and the request itself.
    pub async fn run(&self, client: &NexmoClient) -> Result<(), CallError> {
        let deadline = Instant::now() + self.deadline;
        let body = serde_json::to_vec(&self.request(client))?;
        client.post(client.calls_url(), body, deadline).await?;
        Ok(())
    }
}

/// Turns a stored recording into one outbound call per broadcast contact.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    client: Arc<NexmoClient>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(client: Arc<NexmoClient>, config: BroadcastConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<NexmoClient> {
        &self.client
    }

    /// Decodes the broadcast list and launches the calls.
    ///
    /// A partially corrupted list is logged and the decoded contacts are
    /// still called; any other decode failure aborts before a single call
    /// is placed. The returned handles only signal completion, outcomes are
    /// logged by each task.
    pub async fn broadcast(
        &self,
        source: &dyn ContactSource,
        recording_name: &str,
    ) -> Result<Vec<JoinHandle<()>>, ContactsError> {
        let contacts = match load_broadcast_list(source).await {
            Ok(contacts) => contacts,
            Err(ContactsError::Partial {
                contacts,
                discarded,
            }) => {
                warn!(
                    discarded,
                    kept = contacts.len(),
                    "broadcast list contains corrupted rows, result could be partial"
                );
                contacts
            }
            Err(e) => return Err(e),
        };

        info!(
            contacts = contacts.len(),
            recording = %recording_name,
            "broadcast list decoded"
        );
        Ok(self.launch(contacts, recording_name))
    }

    /// Spawns one independent call task per contact.
    pub fn launch(&self, contacts: Vec<Contact>, recording_name: &str) -> Vec<JoinHandle<()>> {
        let deadline = self
            .config
            .call_deadline(contacts.len(), self.client.call_rate());

        contacts
            .into_iter()
            .map(|contact| {
                let task = CallTask {
                    contact,
                    recording_name: recording_name.to_string(),
                    deadline,
                };
                let client = self.client.clone();
                tokio::spawn(async move {
                    info!(
                        to = %task.contact.number,
                        name = %task.contact.name,
                        recording = %task.recording_name,
                        "calling"
                    );
                    if let Err(e) = task.run(&client).await {
                        error!(
                            to = %task.contact.number,
                            recording = %task.recording_name,
                            "call error: {}",
                            e
                        );
                    }
                })
            })
            .collect()
    }
}
