//! Message list view.
//!
//! Renders a conversation, the empty-state overview, and the loading
//! indicators into an [`Element`] tree. [`MessageList`] keeps the last
//! rendered output and only re-renders when [`props_equal`] reports that
//! the inputs changed, so unrelated state changes in the host (a keystroke
//! in the prompt, a sidebar toggle) do not rebuild the whole conversation.

use std::fmt;

use futures::future::{self, BoxFuture, FutureExt};

use crate::element::{button, div, heading, link, paragraph, text, Element};
use crate::scroll::{NoopScroll, ScrollToBottom};
use crate::types::{
    has_progress_lines, Message, MessageRole, ToolInvocation, ToolInvocationState, Vote,
};
use crate::{Error, Result};

/// Link shown in the empty-state overview.
pub const SOURCE_URL: &str = "https://github.com/Thron-Labs/thronfinance";

const OVERVIEW_TITLE: &str = "Thron AI assistant";
const OVERVIEW_TEXT: &str = "A Finance and trading research assistant for deep understanding \
     and trading capabilities. Ask any question for financial research, stock analysis, and more.";

/// Tool output longer than this is truncated in the rendered tree.
const MAX_TOOL_OUTPUT_CHARS: usize = 500;

// ============================================================================
// Callbacks
// ============================================================================

/// A change to the message sequence, issued by edit actions.
pub enum MessagesUpdate {
    /// Replace the whole sequence.
    Replace(Vec<Message>),
    /// Derive the new sequence from the current one.
    Update(Box<dyn FnOnce(Vec<Message>) -> Vec<Message>>),
}

impl MessagesUpdate {
    pub fn apply(self, current: Vec<Message>) -> Vec<Message> {
        match self {
            MessagesUpdate::Replace(messages) => messages,
            MessagesUpdate::Update(f) => f(current),
        }
    }
}

impl fmt::Debug for MessagesUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagesUpdate::Replace(messages) => {
                f.debug_tuple("Replace").field(&messages.len()).finish()
            }
            MessagesUpdate::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Callbacks into the chat-session controller that owns the conversation.
pub trait ChatActions {
    /// Replace or transform the message sequence.
    fn set_messages(&self, update: MessagesUpdate);

    /// Regenerate the latest response. Resolves to the id of the user
    /// message being answered, or `None` when there is nothing to answer.
    fn reload(&self) -> BoxFuture<'static, Result<Option<String>>>;
}

// ============================================================================
// Props
// ============================================================================

/// Inputs of the message list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageListProps {
    pub chat_id: String,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub votes: Option<Vec<Vote>>,
    pub progress_messages: Option<Vec<String>>,
    pub is_readonly: bool,
    pub is_side_panel_visible: bool,
}

impl MessageListProps {
    pub fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_votes(mut self, votes: Vec<Vote>) -> Self {
        self.votes = Some(votes);
        self
    }

    pub fn with_progress(mut self, lines: Vec<String>) -> Self {
        self.progress_messages = Some(lines);
        self
    }

    pub fn loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    pub fn readonly(mut self, is_readonly: bool) -> Self {
        self.is_readonly = is_readonly;
        self
    }

    pub fn side_panel_visible(mut self, visible: bool) -> Self {
        self.is_side_panel_visible = visible;
        self
    }

    /// Whether the empty-state overview is shown.
    pub fn shows_overview(&self) -> bool {
        !self.is_loading && self.messages.is_empty()
    }

    /// Whether the generic "thinking" indicator is shown.
    pub fn shows_thinking(&self) -> bool {
        self.is_loading && !self.messages.is_empty()
    }

    /// Whether the detailed progress indicator is shown.
    pub fn shows_progress(&self) -> bool {
        self.is_loading && has_progress_lines(self.progress_messages.as_deref())
    }
}

/// Change-detection predicate: `true` means `next` would render the same
/// output as `prev` and the render pass can be skipped.
///
/// Messages and votes are compared structurally; the flags by value.
/// `chat_id` and the progress lines are not compared; [`MessageList::update`]
/// tracks progress on its own.
pub fn props_equal(prev: &MessageListProps, next: &MessageListProps) -> bool {
    prev.messages == next.messages
        && prev.is_loading == next.is_loading
        && prev.votes == next.votes
        && prev.is_readonly == next.is_readonly
        && prev.is_side_panel_visible == next.is_side_panel_visible
}

/// Vote cast on `message_id`, if any. Linear scan; the first match wins.
pub fn vote_for<'a>(votes: Option<&'a [Vote]>, message_id: &str) -> Option<&'a Vote> {
    votes?.iter().find(|vote| vote.message_id == message_id)
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the message list for the given inputs.
pub fn render(props: &MessageListProps) -> Element {
    let votes = props.votes.as_deref();

    div()
        .id("messages")
        .class("flex-1")
        .class("overflow-y-auto")
        .when(!props.is_side_panel_visible, |el| el.class("pr-4"))
        .when(props.shows_overview(), |el| el.child(render_overview()))
        .children(props.messages.iter().map(|message| {
            render_message(
                message,
                vote_for(votes, &message.id),
                props.is_loading,
                props.is_readonly,
            )
        }))
        .when(props.shows_thinking(), |el| el.child(render_thinking()))
        .when(props.shows_progress(), |el| {
            el.child(render_progress(
                props.progress_messages.as_deref().unwrap_or_default(),
            ))
        })
}

fn render_overview() -> Element {
    div()
        .id("overview")
        .class("overview")
        .child(heading(OVERVIEW_TITLE))
        .child(paragraph(OVERVIEW_TEXT))
        .child(link("View source code", SOURCE_URL).id("source-link"))
}

fn render_message(
    message: &Message,
    vote: Option<&Vote>,
    is_loading: bool,
    is_readonly: bool,
) -> Element {
    let show_actions = !is_readonly
        && !is_loading
        && message.role == MessageRole::Assistant
        && message.tool_invocations.is_empty();

    div()
        .id(format!("message-{}", message.id))
        .class("message")
        .class(message.role.as_str())
        .when_some(vote, |el, vote| {
            el.class(if vote.is_upvoted { "upvoted" } else { "downvoted" })
        })
        .child(text(format!("{}:", message.role.label())).class("role"))
        .when(!message.content.is_empty(), |el| {
            el.child(paragraph(message.content.as_str()).class("content"))
        })
        .children(message.tool_invocations.iter().map(render_tool_invocation))
        .when(show_actions, |el| {
            el.child(render_actions(&message.id, vote))
        })
}

fn render_tool_invocation(invocation: &ToolInvocation) -> Element {
    let (state_class, summary) = match (invocation.state, invocation.result.as_ref()) {
        (ToolInvocationState::Result, Some(result)) => {
            let output = result.to_string();
            let output = if output.chars().count() > MAX_TOOL_OUTPUT_CHARS {
                let head: String = output.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
                format!("{head}...")
            } else {
                output
            };
            ("result", format!("{}: {}", invocation.tool_name, output))
        }
        (ToolInvocationState::Result, None) => {
            ("result", format!("{}: done", invocation.tool_name))
        }
        _ => ("call", format!("{} (running)", invocation.tool_name)),
    };

    div()
        .id(format!("tool-{}", invocation.tool_call_id))
        .class("tool-invocation")
        .class(state_class)
        .child(text(summary))
}

fn render_actions(message_id: &str, vote: Option<&Vote>) -> Element {
    let upvoted = vote.is_some_and(|v| v.is_upvoted);
    let downvoted = vote.is_some_and(|v| !v.is_upvoted);

    div()
        .id(format!("actions-{message_id}"))
        .class("inline")
        .child(button(format!("copy-{message_id}"), "Copy"))
        .child(button(format!("upvote-{message_id}"), "Upvote").when(upvoted, |el| el.class("active")))
        .child(
            button(format!("downvote-{message_id}"), "Downvote")
                .when(downvoted, |el| el.class("active")),
        )
}

fn render_thinking() -> Element {
    div()
        .id("thinking-message")
        .class("message")
        .class("assistant")
        .child(text("Thinking..."))
}

fn render_progress(lines: &[String]) -> Element {
    div()
        .id("loading-messages")
        .children(
            lines
                .iter()
                .enumerate()
                .map(|(i, line)| text(line.as_str()).id(format!("loading-message-{i}"))),
        )
}

// ============================================================================
// Memoised view
// ============================================================================

/// Result of [`MessageList::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Skipped,
}

/// Memoised message list.
///
/// Holds the last rendered props and output; [`update`](Self::update)
/// consults [`props_equal`] before recomputing.
pub struct MessageList<S: ScrollToBottom = NoopScroll> {
    scroll: S,
    last_props: Option<MessageListProps>,
    output: Option<Element>,
    render_count: usize,
}

impl<S: ScrollToBottom> MessageList<S> {
    pub fn new(scroll: S) -> Self {
        Self {
            scroll,
            last_props: None,
            output: None,
            render_count: 0,
        }
    }

    /// Feed new inputs. Renders on first use, when [`props_equal`] reports a
    /// change, or when the progress lines differ from the last rendered ones.
    ///
    /// Scrolls to the bottom on the first render and whenever the message
    /// sequence changed.
    pub fn update(&mut self, props: &MessageListProps) -> RenderOutcome {
        if let Some(prev) = &self.last_props {
            if props_equal(prev, props) && prev.progress_messages == props.progress_messages {
                tracing::trace!(chat_id = %props.chat_id, "message list unchanged, skipping render");
                return RenderOutcome::Skipped;
            }
        }

        let messages_changed = self
            .last_props
            .as_ref()
            .is_none_or(|prev| prev.messages != props.messages);

        self.output = Some(render(props));
        self.render_count += 1;
        self.last_props = Some(props.clone());

        tracing::debug!(
            chat_id = %props.chat_id,
            messages = props.messages.len(),
            is_loading = props.is_loading,
            render_count = self.render_count,
            "rendered message list"
        );

        if messages_changed {
            self.scroll.scroll_to_bottom();
        }

        RenderOutcome::Rendered
    }

    /// Last rendered tree.
    pub fn element(&self) -> Option<&Element> {
        self.output.as_ref()
    }

    /// Inputs of the last render.
    pub fn props(&self) -> Option<&MessageListProps> {
        self.last_props.as_ref()
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn scroll(&self) -> &S {
        &self.scroll
    }

    /// Replace the content of a message and drop everything after it, so
    /// the edited message becomes the tail of the conversation.
    pub fn edit_message<A: ChatActions + ?Sized>(
        &self,
        actions: &A,
        message_id: &str,
        content: &str,
    ) -> Result<()> {
        let props = self.editable_props()?;
        if !props.messages.iter().any(|m| m.id == message_id) {
            return Err(Error::MessageNotFound(message_id.to_string()));
        }

        let message_id = message_id.to_string();
        let content = content.to_string();
        actions.set_messages(MessagesUpdate::Update(Box::new(move |mut messages| {
            if let Some(index) = messages.iter().position(|m| m.id == message_id) {
                messages.truncate(index + 1);
                messages[index].content = content;
            }
            messages
        })));
        Ok(())
    }

    /// Ask the controller to regenerate the latest response.
    pub fn regenerate<A: ChatActions + ?Sized>(
        &self,
        actions: &A,
    ) -> BoxFuture<'static, Result<Option<String>>> {
        match self.editable_props() {
            Ok(_) => actions.reload(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }

    fn editable_props(&self) -> Result<&MessageListProps> {
        let props = self
            .last_props
            .as_ref()
            .ok_or_else(|| Error::InvalidOperation("message list has not rendered".to_string()))?;
        if props.is_readonly {
            return Err(Error::InvalidOperation("chat is read-only".to_string()));
        }
        Ok(props)
    }
}

impl Default for MessageList<NoopScroll> {
    fn default() -> Self {
        Self::new(NoopScroll)
    }
}
