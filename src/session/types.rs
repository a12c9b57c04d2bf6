//! Conversation types for Zeolith
//!
//! This module defines the core types for conversation state: messages,
//! roles, tool calls, and the `Conversation` entity that the orchestrator
//! persists between turns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A complete conversation session: the ordered message log plus an
/// in-memory workspace for file artifacts produced during the session.
///
/// The workspace maps filenames to base64-encoded content blobs so that
/// structure files can be passed between tool invocations without being
/// re-transmitted through the model.
///
/// Invariants maintained by the orchestrator:
/// - messages are append-only, never reordered or truncated
/// - `session_id`, once set, never changes
/// - at most one system message, always first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque session identifier; `None` until first bound by the orchestrator
    pub session_id: Option<String>,
    /// Ordered list of messages in this conversation
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Per-session workspace: filename -> base64 content blob
    #[serde(default)]
    pub workspace: HashMap<String, String>,
}

impl Conversation {
    /// Create a new empty conversation with no session id bound yet.
    ///
    /// # Example
    /// ```
    /// use zeolith::session::Conversation;
    ///
    /// let conversation = Conversation::new();
    /// assert!(conversation.messages.is_empty());
    /// assert!(conversation.session_id.is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the log.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get the number of messages in this conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Check if this conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the last message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Look up a workspace file by name.
    pub fn workspace_file(&self, filename: &str) -> Option<&str> {
        self.workspace.get(filename).map(|s| s.as_str())
    }

    /// Store a file in the workspace, replacing any previous content under
    /// the same name.
    pub fn put_workspace_file(&mut self, filename: &str, content_base64: &str) {
        self.workspace
            .insert(filename.to_string(), content_base64.to_string());
    }
}

/// A single message in a conversation.
///
/// Messages can be from users, the assistant, system prompts, or tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message (empty when the assistant only
    /// requested tool calls)
    #[serde(default)]
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use zeolith::session::{Message, Role};
    ///
    /// let msg = Message::user("What is the pore diameter of MOF-5?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message (prompts and instructions).
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering a structured invocation.
    ///
    /// Carries the id of the originating call so the provider can pair the
    /// observation with the request.
    ///
    /// # Example
    /// ```
    /// use zeolith::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "Included Sphere Diameter: 11.2");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create a synthetic observation utterance for text-parsed invocations.
    ///
    /// ReAct text mode has no tool-call ids, so the observation is framed as
    /// a user turn the model conditions on.
    pub fn observation(content: &str) -> Self {
        Self {
            role: Role::User,
            content: format!("Observation: {}", content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying structured tool calls.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Check if this message carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user (including synthetic observations)
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A structured tool invocation requested by the assistant.
///
/// The id is issued by the LLM gateway and echoed back in the paired
/// tool-result message; it is unique within its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use zeolith::session::ToolCall;
    ///
    /// let call = ToolCall::new("call_1", "calculate_pore_diameter",
    ///     r#"{"source_filename": "mof5.cif"}"#);
    /// assert_eq!(call.name, "calculate_pore_diameter");
    /// ```
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}
