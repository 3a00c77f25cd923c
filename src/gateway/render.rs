//! Chat-completion JSON to the legacy `<chat>` XML document.

use serde_json::Value;

pub const XML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

const DEFAULT_ROLE: &str = "assistant";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: String,
    pub content: String,
}

/// Reads `choices[].message.{role,content}`. Anything that is not valid JSON
/// or has no `choices` array yields no messages.
pub fn extract_messages(body: &[u8]) -> Vec<RenderedMessage> {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Vec::new();
    };
    let Some(choices) = value.get("choices").and_then(Value::as_array) else {
        return Vec::new();
    };

    choices
        .iter()
        .map(|choice| {
            let message = choice.get("message");
            let field = |name: &str| {
                message
                    .and_then(|message| message.get(name))
                    .and_then(Value::as_str)
            };
            RenderedMessage {
                role: field("role").unwrap_or(DEFAULT_ROLE).to_string(),
                content: field("content").unwrap_or_default().to_string(),
            }
        })
        .collect()
}

pub fn render_chat_xml(messages: &[RenderedMessage]) -> String {
    let mut out = String::from("<chat>");
    for message in messages {
        out.push_str("<message role=\"");
        escape_into(&mut out, &message.role);
        out.push_str("\">");
        escape_into(&mut out, &message.content);
        out.push_str("</message>");
    }
    out.push_str("</chat>");
    out
}

pub fn render_chat_response(body: &[u8]) -> String {
    render_chat_xml(&extract_messages(body))
}

/// Single pass over `&`, `<`, `>`; quotes are left alone.
pub fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}
