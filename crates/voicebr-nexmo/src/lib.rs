//! Nexmo voice integration for the broadcast server.
//!
//! Provides the authenticated, rate-limited client for the voice API, the
//! contact directory decoder, the call control objects returned to
//! webhooks, and the [`Broadcaster`] that fans a stored recording out to
//! every contact on the broadcast list.
//!
//! Two independent [`RateLimiter`]s are injected into the client: one for
//! call creation and one for downloads. They are the only shared state
//! between concurrent calls.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod contacts;
pub mod error;
pub mod ncco;
pub mod rate_limit;
pub mod webhook;

pub use broadcast::{BroadcastConfig, Broadcaster, CallTask};
pub use client::{load_signing_key, parse_signing_key, Limiters, NexmoClient};
pub use config::NexmoConfig;
pub use contacts::{decode_contacts, load_broadcast_list, load_whitelist, Contact};
pub use error::{CallError, ContactsError, RateLimitError, TransportError};
pub use ncco::{Action, Prompts};
pub use rate_limit::RateLimiter;
pub use webhook::{AnswerRequest, RecordingEvent};
