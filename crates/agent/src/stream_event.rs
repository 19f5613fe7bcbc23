//! Turn-level streaming events.
//!
//! `UiStreamEvent` wraps provider-level stream chunks into the events the
//! gateway forwards to clients as SSE `data:` frames.

use serde::{Deserialize, Serialize};
use tentacool_core::provider::Usage;

/// Events emitted by the session controller during one streamed turn.
///
/// Wire protocol:
/// - `text-delta`  — partial assistant text from the model
/// - `tool-call`   — the model requested a tool invocation
/// - `tool-result` — the tool finished (or failed)
/// - `finish`      — the turn is over, with step and usage metadata
/// - `error`       — the turn broke mid-stream; always terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamEvent {
    /// Partial assistant text.
    TextDelta { delta: String },

    /// The model is calling a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed. Failures flow through here too, with
    /// `success: false`; they never abort the turn.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The turn is complete.
    Finish {
        steps: usize,
        tool_calls: usize,
        usage: Option<Usage>,
    },

    /// The turn failed mid-stream. Terminal.
    Error { message: String },
}

impl UiStreamEvent {
    /// Wire name of this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON payload of an SSE `data:` frame.
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failure"}"#.into())
    }
}
