//! Conversation transcript entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Role {
    /// System prompt.
    #[serde(rename = "system")]
    System,
    /// User input.
    #[serde(rename = "user")]
    User,
    /// Assistant output.
    #[serde(rename = "assistant")]
    Assistant,
    /// A function call emitted by the assistant.
    #[serde(rename = "functionCall")]
    FunctionCall,
    /// The result of a function call.
    #[serde(rename = "functionResult")]
    FunctionResult,
}

impl Role {
    /// Returns the role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::FunctionCall => "functionCall",
            Role::FunctionResult => "functionResult",
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    /// Role of the entry.
    pub role: Role,
    /// Name of the function for function entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a function call entry recording the name and the parsed arguments.
    pub fn function_call(name: &str, arguments: &Value) -> Self {
        Self {
            role: Role::FunctionCall,
            name: Some(name.to_owned()),
            content: arguments.to_string(),
        }
    }

    /// Creates a function result entry.
    pub fn function_call_result(name: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::FunctionResult,
            name: Some(name.to_owned()),
            content: content.into(),
        }
    }
}

/// A function call together with its result.
///
/// The pair is the unit of appending: a call is never recorded without its result.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptPair {
    call: ChatMessage,
    result: ChatMessage,
}

impl TranscriptPair {
    /// Creates a pair for the function call and its result text.
    pub fn new(name: &str, arguments: &Value, result: impl Into<String>) -> Self {
        Self {
            call: ChatMessage::function_call(name, arguments),
            result: ChatMessage::function_call_result(name, result),
        }
    }

    /// Returns the call entry.
    #[inline]
    pub fn call(&self) -> &ChatMessage {
        &self.call
    }

    /// Returns the result entry.
    #[inline]
    pub fn result(&self) -> &ChatMessage {
        &self.result
    }

    /// Returns both entries in order.
    pub fn into_messages(self) -> [ChatMessage; 2] {
        [self.call, self.result]
    }
}

/// Append-only chat transcript.
#[derive(Debug, Clone, Default)]
pub struct Chat {
    messages: Vec<ChatMessage>,
}

impl Chat {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single conversational message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Appends a function call and its result.
    pub fn append_pair(&mut self, pair: TranscriptPair) {
        self.messages.extend(pair.into_messages());
    }

    /// Returns the messages in order.
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the transcript is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
