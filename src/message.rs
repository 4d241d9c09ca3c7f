//! Conversation messages and tool invocations.
//!
//! [`Message`] is the unit of conversation history carried by the workflow
//! state. Messages are immutable; [`Message::with_tool_calls`] returns a new
//! instance rather than mutating in place.
//!
//! # Examples
//!
//! ```rust
//! use filament::message::Message;
//!
//! let user = Message::user("What changed in the last deploy?");
//! let reply = Message::assistant("Three services were updated.");
//! assert_eq!(user.role, "user");
//! assert_eq!(reply.role, "assistant");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::id_generator::IdGenerator;

/// Lifecycle of a single tool invocation recorded on a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// A tool invocation requested by a model or node.
///
/// `arguments` carries the serialized argument payload verbatim; the engine
/// never interprets it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolCall {
    /// Creates a pending tool call with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: IdGenerator::new().tool_call_id(),
            name: name.into(),
            arguments: arguments.into(),
            output: None,
            status: ToolCallStatus::Pending,
            completed_at: None,
        }
    }

    /// Returns a completed copy carrying the tool's output.
    #[must_use]
    pub fn completed(&self, output: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.output = Some(output.into());
        next.status = ToolCallStatus::Completed;
        next.completed_at = Some(Utc::now());
        next
    }

    /// Returns a failed copy carrying the error text as output.
    #[must_use]
    pub fn errored(&self, error: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.output = Some(error.into());
        next.status = ToolCallStatus::Error;
        next.completed_at = Some(Utc::now());
        next
    }
}

/// A message in a conversation: role, content, and optional tool calls.
///
/// `role` is free-form; the constants on `Message` cover the common values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Optional sender name (e.g. the tool that produced a `"tool"` message).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool output message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a message with the given role and content.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: IdGenerator::new().message_id(),
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: None,
            name: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates a tool-output message named after the tool that produced it.
    #[must_use]
    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Self::TOOL, content);
        msg.name = Some(name.into());
        msg
    }

    /// Returns a copy carrying the given tool calls.
    #[must_use]
    pub fn with_tool_calls(&self, tool_calls: Vec<ToolCall>) -> Self {
        let mut next = self.clone();
        next.tool_calls = Some(tool_calls);
        next
    }

    /// Returns a copy with the sender name set.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.name = Some(name.into());
        next
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl From<&str> for Message {
    /// A bare string becomes a user message.
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<(&str, &str)> for Message {
    /// A `(role, content)` pair becomes a message with that role.
    fn from((role, content): (&str, &str)) -> Self {
        Self::new(role, content)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}
