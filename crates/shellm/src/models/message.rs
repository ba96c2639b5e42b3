use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Body of a message: plain text, or a list of typed parts as some
/// clients send for user content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default)]
    pub text: String,
}

impl MessageContent {
    /// Flatten to plain text. Parts of type "text" are space-joined;
    /// other part types carry nothing useful for a wire request.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| part.part_type == "text")
                .map(|part| part.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A message to or from an LLM.
///
/// Conversation history is append-only: once a message is pushed onto the
/// conversation it is never mutated or removed. An assistant message with
/// tool calls may carry no content at all; a tool message must carry the
/// id of the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System).with_text(text)
    }

    /// Create a new user message
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User).with_text(text)
    }

    /// Create a new assistant message with no content
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a tool result message answering the call with the given id
    pub fn tool<I: Into<String>, S: Into<String>>(tool_call_id: I, content: S) -> Self {
        let mut message = Self::new(Role::Tool).with_text(content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Set text content on the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(MessageContent::Text(text.into()));
        self
    }

    /// Attach tool calls to the message
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Flattened text content, if any
    pub fn text(&self) -> Option<String> {
        self.content.as_ref().map(MessageContent::flatten)
    }
}
