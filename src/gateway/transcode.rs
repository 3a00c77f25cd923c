//! Legacy form bodies to chat-completion JSON.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Serialize, Serializer};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: i64 = 1024;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_TOP_K: i64 = 40;
pub const DEFAULT_PRESENCE_PENALTY: f64 = 0.0;
pub const DEFAULT_FREQUENCY_PENALTY: f64 = 0.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.6;

const LEGACY_FIELDS: [&str; 9] = [
    "model",
    "systemMessage",
    "userMessage",
    "max_tokens",
    "top_p",
    "top_k",
    "presence_penalty",
    "frequency_penalty",
    "temperature",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: i64,
    #[serde(serialize_with = "serialize_number")]
    pub top_p: f64,
    pub top_k: i64,
    #[serde(serialize_with = "serialize_number")]
    pub presence_penalty: f64,
    #[serde(serialize_with = "serialize_number")]
    pub frequency_penalty: f64,
    #[serde(serialize_with = "serialize_number")]
    pub temperature: f64,
}

/// Integral floats are written as integers (`1` rather than `1.0`).
fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Recognized legacy form fields. Unknown keys are dropped; for duplicated
/// keys the last value wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacyFormFields {
    fields: HashMap<&'static str, String>,
}

impl LegacyFormFields {
    pub fn parse(body: &[u8]) -> Self {
        let mut fields = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            if let Some(name) = LEGACY_FIELDS.iter().find(|name| **name == key) {
                fields.insert(*name, value.into_owned());
            }
        }
        Self { fields }
    }

    /// Empty values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn int_or(&self, name: &str, default: i64) -> i64 {
        self.get(name)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(default)
    }

    fn float_or(&self, name: &str, default: f64) -> f64 {
        self.get(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(default)
    }

    pub fn into_chat_request(self) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.get("model").unwrap_or(DEFAULT_MODEL).to_string(),
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: self.get("systemMessage").unwrap_or_default().to_string(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: self.get("userMessage").unwrap_or_default().to_string(),
                },
            ],
            max_tokens: self.int_or("max_tokens", DEFAULT_MAX_TOKENS),
            top_p: self.float_or("top_p", DEFAULT_TOP_P),
            top_k: self.int_or("top_k", DEFAULT_TOP_K),
            presence_penalty: self.float_or("presence_penalty", DEFAULT_PRESENCE_PENALTY),
            frequency_penalty: self.float_or("frequency_penalty", DEFAULT_FREQUENCY_PENALTY),
            temperature: self.float_or("temperature", DEFAULT_TEMPERATURE),
        }
    }
}

/// Substring match, case-sensitive as received.
pub fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.contains(FORM_CONTENT_TYPE))
}

/// The outcome of the transcoding step. Carried by value into response
/// rendering; `Transcoded` is the only signal that the reply must be XML.
#[derive(Debug)]
pub enum TranscodeOutcome<B> {
    Transcoded { body: Bytes, content_type: &'static str },
    Passthrough { body: B },
}

impl<B> TranscodeOutcome<B> {
    pub fn was_transcoded(&self) -> bool {
        matches!(self, Self::Transcoded { .. })
    }
}

/// Rewrites an already-buffered form body into the chat-completion payload.
pub fn transcode_form_body(body: &[u8]) -> Result<Bytes, serde_json::Error> {
    let request = LegacyFormFields::parse(body).into_chat_request();
    serde_json::to_vec(&request).map(Bytes::from)
}
