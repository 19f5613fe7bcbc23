//! Message and Conversation domain types.
//!
//! These are the value objects that flow through one agent turn:
//! the client resends the full history with every request, the session
//! controller appends to it, and nothing survives the request server-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (an attendee)
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (persona prompt)
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            timestamp: Utc::now(),
        }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string (as emitted by the model)
    pub arguments: String,
}

/// An ordered sequence of messages making up one turn's context.
///
/// History is append-only: the session controller only ever pushes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    /// Ordered messages
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation from an existing history.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Ensure the given system prompt is the first message, replacing any
    /// system message the client may have sent.
    pub fn set_system_prompt(&mut self, prompt: &str) {
        if self.messages.first().map(|m| m.role == Role::System) == Some(true) {
            self.messages[0] = Message::system(prompt);
        } else {
            self.messages.insert(0, Message::system(prompt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("hola");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hola");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool_result("call_1", "done");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.role, Role::Tool);
        assert_eq!(deserialized.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn set_system_prompt_inserts_first() {
        let mut conv = Conversation::from_messages(vec![Message::user("hi")]);
        conv.set_system_prompt("be helpful");
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages.len(), 2);
    }

    #[test]
    fn set_system_prompt_replaces_existing() {
        let mut conv = Conversation::from_messages(vec![
            Message::system("old prompt"),
            Message::user("hi"),
        ]);
        conv.set_system_prompt("new prompt");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].content, "new prompt");
    }
}
