//! Chat session state and persistence.
//!
//! [`ChatSession`] owns the conversation that the message list renders:
//! messages, votes, and generation progress. The list never mutates this
//! state itself; it goes through the [`ChatActions`] callbacks implemented
//! here.

use crate::message_list::{ChatActions, MessageListProps, MessagesUpdate};
use crate::types::{LoadingState, Message, Vote};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

/// Persisted form of a chat.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub chat_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub votes: Vec<Vote>,
    /// Shared chats are displayed without edit or vote controls
    #[serde(default)]
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Chat-session controller.
///
/// Single-threaded: callbacks take `&self` and mutate through `RefCell`,
/// the way UI-loop state is shared between a view and its controller.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: RefCell<Transcript>,
    loading: RefCell<LoadingState>,
    side_panel_visible: Cell<bool>,
}

impl ChatSession {
    /// Create an empty session.
    pub fn new(chat_id: &str) -> Self {
        Self::from_transcript(Transcript {
            chat_id: chat_id.to_string(),
            ..Default::default()
        })
    }

    pub fn from_transcript(transcript: Transcript) -> Self {
        Self {
            transcript: RefCell::new(transcript),
            ..Default::default()
        }
    }

    /// Load a session from a JSON transcript.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let transcript: Transcript = serde_json::from_str(&content)?;
        tracing::debug!(
            chat_id = %transcript.chat_id,
            messages = transcript.messages.len(),
            "loaded transcript from {}",
            path.display()
        );
        Ok(Self::from_transcript(transcript))
    }

    /// Save the session as a JSON transcript.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut transcript = self.transcript.borrow_mut();
        transcript.updated_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(&*transcript)?;
        fs::write(path, content)?;
        tracing::info!(chat_id = %transcript.chat_id, "saved transcript to {}", path.display());
        Ok(())
    }

    pub fn chat_id(&self) -> String {
        self.transcript.borrow().chat_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.borrow().messages.clone()
    }

    pub fn votes(&self) -> Vec<Vote> {
        self.transcript.borrow().votes.clone()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading.borrow().clone()
    }

    pub fn is_readonly(&self) -> bool {
        self.transcript.borrow().readonly
    }

    pub fn set_readonly(&self, readonly: bool) {
        self.transcript.borrow_mut().readonly = readonly;
    }

    pub fn set_side_panel_visible(&self, visible: bool) {
        self.side_panel_visible.set(visible);
    }

    /// Append a message to the end of the conversation.
    pub fn append(&self, message: Message) {
        self.transcript.borrow_mut().messages.push(message);
    }

    /// Cast or change the vote on a message.
    pub fn vote(&self, message_id: &str, is_upvoted: bool) -> Result<Vote> {
        let mut transcript = self.transcript.borrow_mut();
        if transcript.readonly {
            return Err(Error::InvalidOperation("chat is read-only".to_string()));
        }
        if !transcript.messages.iter().any(|m| m.id == message_id) {
            return Err(Error::MessageNotFound(message_id.to_string()));
        }

        let vote = Vote {
            chat_id: transcript.chat_id.clone(),
            message_id: message_id.to_string(),
            is_upvoted,
        };
        match transcript
            .votes
            .iter()
            .position(|v| v.message_id == message_id)
        {
            Some(index) => transcript.votes[index] = vote.clone(),
            None => transcript.votes.push(vote.clone()),
        }
        Ok(vote)
    }

    /// Mark a generation as in flight.
    pub fn set_loading(&self, is_loading: bool) {
        self.loading.borrow_mut().is_loading = is_loading;
    }

    /// Add a progress line for the generation in flight.
    pub fn push_progress(&self, line: impl Into<String>) {
        self.loading
            .borrow_mut()
            .progress_messages
            .get_or_insert_with(Vec::new)
            .push(line.into());
    }

    /// Generation finished: clear the loading flag and progress lines.
    pub fn finish(&self) {
        *self.loading.borrow_mut() = LoadingState::default();
    }

    /// Snapshot of the inputs the message list renders from.
    pub fn props(&self) -> MessageListProps {
        let transcript = self.transcript.borrow();
        let loading = self.loading.borrow();
        MessageListProps {
            chat_id: transcript.chat_id.clone(),
            messages: transcript.messages.clone(),
            is_loading: loading.is_loading,
            votes: Some(transcript.votes.clone()),
            progress_messages: loading.progress_messages.clone(),
            is_readonly: transcript.readonly,
            is_side_panel_visible: self.side_panel_visible.get(),
        }
    }
}

impl ChatActions for ChatSession {
    fn set_messages(&self, update: MessagesUpdate) {
        let mut transcript = self.transcript.borrow_mut();
        let current = std::mem::take(&mut transcript.messages);
        transcript.messages = update.apply(current);
    }

    /// Trim the conversation back to the last user message and start a new
    /// generation for it.
    fn reload(&self) -> BoxFuture<'static, Result<Option<String>>> {
        let user_message_id = {
            let mut transcript = self.transcript.borrow_mut();
            match transcript.messages.iter().rposition(Message::is_user) {
                Some(index) => {
                    transcript.messages.truncate(index + 1);
                    Some(transcript.messages[index].id.clone())
                }
                None => None,
            }
        };

        if let Some(id) = &user_message_id {
            self.finish();
            self.set_loading(true);
            tracing::info!(chat_id = %self.chat_id(), message_id = %id, "regenerating response");
        }
        future::ready(Ok(user_message_id)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_list::{MessageList, RenderOutcome};
    use futures::executor::block_on;
    use tempfile::tempdir;

    fn session() -> ChatSession {
        let session = ChatSession::new("c1");
        session.append(Message::user("m1", "Compare AAPL and MSFT margins"));
        session.append(Message::assistant("m2", "AAPL: 46%, MSFT: 70%"));
        session
    }

    #[test]
    fn test_props_snapshot() {
        let session = session();
        session.set_loading(true);
        session.push_progress("Fetching income statements");
        session.set_side_panel_visible(true);

        let props = session.props();
        assert_eq!(props.chat_id, "c1");
        assert_eq!(props.messages.len(), 2);
        assert!(props.is_loading);
        assert_eq!(
            props.progress_messages,
            Some(vec!["Fetching income statements".to_string()])
        );
        assert!(props.is_side_panel_visible);
        assert_eq!(props.votes, Some(vec![]));
    }

    #[test]
    fn test_vote_upsert() {
        let session = session();
        session.vote("m2", true).unwrap();
        session.vote("m2", false).unwrap();

        let votes = session.votes();
        assert_eq!(votes.len(), 1);
        assert!(!votes[0].is_upvoted);
        assert_eq!(votes[0].chat_id, "c1");
    }

    #[test]
    fn test_vote_unknown_message() {
        let session = session();
        let result = session.vote("m9", true);
        assert!(matches!(result, Err(Error::MessageNotFound(_))));
    }

    #[test]
    fn test_vote_readonly() {
        let session = session();
        session.set_readonly(true);
        assert!(matches!(session.vote("m2", true), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_set_messages_replace_and_update() {
        let session = session();
        session.set_messages(MessagesUpdate::Update(Box::new(|mut messages| {
            messages.pop();
            messages
        })));
        assert_eq!(session.messages().len(), 1);

        session.set_messages(MessagesUpdate::Replace(vec![]));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_reload_trims_to_last_user_message() {
        let session = session();
        session.append(Message::assistant("m3", "Follow-up detail"));

        let result = block_on(session.reload()).unwrap();
        assert_eq!(result.as_deref(), Some("m1"));
        assert_eq!(session.messages().len(), 1);
        assert!(session.loading_state().is_loading);
    }

    #[test]
    fn test_reload_without_user_message() {
        let session = ChatSession::new("c1");
        session.append(Message::assistant("m1", "Welcome"));

        let result = block_on(session.reload()).unwrap();
        assert!(result.is_none());
        assert_eq!(session.messages().len(), 1);
        assert!(!session.loading_state().is_loading);
    }

    #[test]
    fn test_finish_clears_progress() {
        let session = session();
        session.set_loading(true);
        session.push_progress("Step 1");
        session.finish();

        assert_eq!(session.loading_state(), LoadingState::default());
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chats/c1.json");

        {
            let session = session();
            session.vote("m2", true).unwrap();
            session.save_to_path(&path).unwrap();
        }

        {
            let session = ChatSession::load_from_path(&path).unwrap();
            assert_eq!(session.chat_id(), "c1");
            assert_eq!(session.messages().len(), 2);
            assert_eq!(session.votes(), vec![Vote::up("c1", "m2")]);
            // Loading state is not persisted.
            assert!(!session.loading_state().is_loading);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ChatSession::load_from_path(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_list_edit_round_trip() {
        let session = session();
        let mut list: MessageList = MessageList::default();

        assert_eq!(list.update(&session.props()), RenderOutcome::Rendered);
        // A keystroke elsewhere in the app produces an equal snapshot.
        assert_eq!(list.update(&session.props()), RenderOutcome::Skipped);

        list.edit_message(&session, "m1", "Compare AAPL and GOOG margins")
            .unwrap();
        assert_eq!(list.update(&session.props()), RenderOutcome::Rendered);

        let rendered = list.element().unwrap();
        assert!(rendered.contains("message-m1"));
        assert!(!rendered.contains("message-m2"));
        assert_eq!(list.render_count(), 2);
    }

    #[test]
    fn test_list_regenerate_shows_thinking() {
        let session = session();
        let mut list: MessageList = MessageList::default();
        list.update(&session.props());

        block_on(list.regenerate(&session)).unwrap();
        session.push_progress("Reading 10-K");
        list.update(&session.props());

        let rendered = list.element().unwrap();
        assert!(rendered.contains("thinking-message"));
        assert!(rendered.contains("loading-messages"));
    }

    #[test]
    fn test_list_shows_progress_during_generation() {
        let session = ChatSession::new("chat-1");
        session.append(Message::user("u1", "What moved NVDA today?"));
        let mut list: MessageList = MessageList::default();

        session.set_loading(true);
        assert_eq!(list.update(&session.props()), RenderOutcome::Rendered);
        assert!(!list.element().unwrap().contains("loading-messages"));

        session.push_progress("Fetching prices");
        assert_eq!(list.update(&session.props()), RenderOutcome::Rendered);
        let rendered = list.element().unwrap();
        assert!(rendered.contains("thinking-message"));
        assert!(rendered.contains("loading-messages"));
        assert_eq!(list.render_count(), 2);
    }
}
