//! Thron Core - Chat core for the Thron finance research assistant.
//!
//! This crate provides the pieces of the chat interface that are independent
//! of any windowing backend:
//!
//! - **Message list**: Renders a conversation into an element tree, with an
//!   explicit change-detection guard that skips redundant re-renders
//! - **Chat session**: Owns messages, votes, and loading state and applies
//!   the edit/regenerate callbacks issued by the message list
//! - **Credentials**: Resolves API keys from local storage first and
//!   environment configuration second
//! - **Configuration**: TOML settings for storage paths and env var names
//!
//! # Example
//!
//! ```rust
//! use thron_core::{Message, MessageList, MessageListProps, NoopScroll};
//!
//! let mut list = MessageList::new(NoopScroll);
//! let props = MessageListProps::new("chat-1")
//!     .with_messages(vec![Message::user("m1", "How did AAPL close today?")]);
//!
//! list.update(&props);
//! // Unchanged inputs do not trigger a second render pass.
//! list.update(&props.clone());
//! assert_eq!(list.render_count(), 1);
//! ```

pub mod config;
pub mod credentials;
pub mod element;
pub mod message_list;
pub mod scroll;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use types::{
    ApiResponse, LoadingState, Message, MessageRole, ToolInvocation, ToolInvocationState, Vote,
};

// Re-export main functionality
pub use config::Config;
pub use credentials::{
    ApiKey, CredentialResolver, EnvSource, ExecutionContext, FileKeyStore, KeyStore, MapEnv,
    MemoryKeyStore, ProcessEnv,
};
pub use element::Element;
pub use message_list::{
    props_equal, vote_for, ChatActions, MessageList, MessageListProps, MessagesUpdate,
    RenderOutcome,
};
pub use scroll::{NoopScroll, ScrollCounter, ScrollToBottom};
pub use session::{ChatSession, Transcript};

/// Error types for thron-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unknown API key: {0}")]
    UnknownKey(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for thron-core operations.
pub type Result<T> = std::result::Result<T, Error>;
