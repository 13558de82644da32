//! Call control objects (NCCOs) returned to the voice platform.

use crate::webhook;
use serde::{Deserialize, Serialize};

/// Format recordings are captured and stored in.
pub const REC_FORMAT: &str = "mp3";

/// One step of a call control object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Talk {
        text: String,
        voice_name: String,
        level: f64,
    },
    #[serde(rename_all = "camelCase")]
    Record {
        format: String,
        beep_start: bool,
        end_on_key: String,
        event_url: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Stream { stream_url: Vec<String>, level: f64 },
}

fn default_voice_name() -> String {
    "Carla".to_string()
}

fn default_level() -> f64 {
    0.5
}

fn default_greeting() -> String {
    "Parla pure".to_string()
}

fn default_playback_intro() -> String {
    "Messaggio registrato".to_string()
}

fn default_playback_outro() -> String {
    "Fine messaggio".to_string()
}

/// What the platform says on each leg, and with which voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    #[serde(default = "default_level")]
    pub level: f64,
    /// Said to the whitelisted caller before recording, followed by their name.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_playback_intro")]
    pub playback_intro: String,
    #[serde(default = "default_playback_outro")]
    pub playback_outro: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            voice_name: default_voice_name(),
            level: default_level(),
            greeting: default_greeting(),
            playback_intro: default_playback_intro(),
            playback_outro: default_playback_outro(),
        }
    }
}

impl Prompts {
    fn talk(&self, text: impl Into<String>) -> Action {
        Action::Talk {
            text: text.into(),
            voice_name: self.voice_name.clone(),
            level: self.level,
        }
    }

    /// Greets an authorized caller and records their message. The platform
    /// reports the finished recording to the store webhook under `origin`.
    pub fn record(&self, caller_name: &str, origin: &str) -> Vec<Action> {
        let greeting = if caller_name.is_empty() {
            self.greeting.clone()
        } else {
            format!("{} {}", self.greeting, caller_name)
        };
        vec![
            self.talk(greeting),
            Action::Record {
                format: REC_FORMAT.to_string(),
                beep_start: true,
                end_on_key: "#".to_string(),
                event_url: vec![webhook::store_recording_event_url(origin)],
            },
        ]
    }

    /// Plays the stored recording `rec_name` between an intro and an outro.
    pub fn playback(&self, rec_name: &str, origin: &str) -> Vec<Action> {
        vec![
            self.talk(self.playback_intro.clone()),
            Action::Stream {
                stream_url: vec![webhook::static_url(origin, rec_name)],
                level: self.level,
            },
            self.talk(self.playback_outro.clone()),
        ]
    }
}
