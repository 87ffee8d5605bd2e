//! Wire protocol between the bridge and its remote endpoint.
//!
//! Every frame is a JSON object with a `type` discriminator. Outbound frames
//! carry their payload under `content`; inbound queries may use `query`,
//! `content` or `text`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use turnbridge_core::Turn;

/// Message from the bridge to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A completed turn, or a retry prompt repeating a menu.
    Response(Turn),
    /// A menu selection was injected.
    Confirmation(String),
    /// A command could not be understood.
    Error(String),
}

impl OutboundMessage {
    /// Serialize to a text frame payload.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Command from the endpoint to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// Free-form text to submit as a new prompt.
    Query(String),
    /// Raw menu selector, still to be parsed.
    Action(String),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Something to act on.
    Command(InboundCommand),
    /// A query frame without any usable text.
    EmptyQuery,
    /// A well-formed frame of a type the bridge does not handle.
    Ignored(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    query: Option<Value>,
    content: Option<Value>,
    text: Option<Value>,
}

impl Inbound {
    /// Decode one text frame.
    ///
    /// # Errors
    /// Returns error if the frame is not a JSON object.
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(frame)?;
        let kind = raw.kind.unwrap_or_default();

        Ok(match kind.as_str() {
            "query" => [raw.query, raw.content, raw.text]
                .into_iter()
                .flatten()
                .find_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s),
                    _ => None,
                })
                .map_or(Self::EmptyQuery, |text| {
                    Self::Command(InboundCommand::Query(text))
                }),
            "action" => Self::Command(InboundCommand::Action(selector_text(raw.content))),
            _ => Self::Ignored(kind),
        })
    }
}

fn selector_text(content: Option<Value>) -> String {
    match content {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
