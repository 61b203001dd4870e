//! Core data types for the Thron chat interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Message Types
// ============================================================================

/// Role of the author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    /// Lowercase name, as used in transcripts and element classes.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }

    /// Label shown next to a rendered message.
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant => "Thron",
            MessageRole::System => "System",
            MessageRole::Tool => "Tool",
        }
    }
}

/// Lifecycle of a tool call attached to an assistant message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

/// A tool call made by the assistant while producing a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    pub state: ToolInvocationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolInvocation {
    /// Create a pending call with the given arguments.
    pub fn call(tool_call_id: &str, tool_name: &str, args: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            args,
            state: ToolInvocationState::Call,
            result: None,
        }
    }

    /// Complete the call with a result.
    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.state = ToolInvocationState::Result;
        self.result = Some(result);
        self
    }
}

/// A single chat message.
///
/// Messages are compared structurally: two messages are equal when every
/// field, including nested tool invocation arguments, is equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message with the given id, role, and content.
    pub fn new(id: &str, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            role,
            content: content.into(),
            tool_invocations: Vec::new(),
            created_at: None,
        }
    }

    /// Create a user message.
    pub fn user(id: &str, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(id: &str, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::Assistant, content)
    }

    /// Create a message with a freshly generated id, stamped with the current time.
    pub fn generate(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            created_at: Some(Utc::now()),
            ..Self::new(&uuid::Uuid::new_v4().to_string(), role, content)
        }
    }

    /// Attach a tool invocation.
    pub fn with_tool_invocation(mut self, invocation: ToolInvocation) -> Self {
        self.tool_invocations.push(invocation);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

// ============================================================================
// Votes
// ============================================================================

/// A thumbs up/down cast on an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub chat_id: String,
    pub message_id: String,
    pub is_upvoted: bool,
}

impl Vote {
    pub fn up(chat_id: &str, message_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            is_upvoted: true,
        }
    }

    pub fn down(chat_id: &str, message_id: &str) -> Self {
        Self {
            is_upvoted: false,
            ..Self::up(chat_id, message_id)
        }
    }
}

// ============================================================================
// Loading State
// ============================================================================

/// Generation progress: whether a response is in flight, plus optional
/// human-readable progress lines surfaced while it is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_messages: Option<Vec<String>>,
}

impl LoadingState {
    /// True when there is at least one progress line to show.
    pub fn has_progress(&self) -> bool {
        has_progress_lines(self.progress_messages.as_deref())
    }
}

pub(crate) fn has_progress_lines(lines: Option<&[String]>) -> bool {
    lines.is_some_and(|lines| !lines.is_empty())
}

// ============================================================================
// API Response
// ============================================================================

/// API response wrapper used for CLI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
