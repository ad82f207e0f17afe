//! Per-conversation history: what the user sees and what the model is sent.

pub mod display;

pub use display::DisplayList;

use tracing::debug;

use crate::types::{ConversationItem, MessageItem, UpstreamItem};

/// State of one conversation.
///
/// Callers create one per conversation and hand it to the orchestrator by
/// mutable reference; nothing else holds it.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    display: DisplayList,
    upstream: Vec<UpstreamItem>,
    conversation_id: Option<String>,
    greeting: Option<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history seeded with an assistant greeting (display only).
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut history = Self {
            greeting: Some(greeting.into()),
            ..Self::default()
        };
        history.seed_greeting();
        history
    }

    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayList {
        &mut self.display
    }

    pub fn upstream(&self) -> &[UpstreamItem] {
        &self.upstream
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Record the remote conversation id. An id already known is kept.
    pub fn set_conversation_id(&mut self, id: impl Into<String>) -> bool {
        if self.conversation_id.is_some() {
            return false;
        }
        let id = id.into();
        if id.is_empty() {
            return false;
        }
        debug!(conversation_id = id.as_str(), "conversation id assigned");
        self.conversation_id = Some(id);
        true
    }

    pub fn push_display(&mut self, item: ConversationItem) -> usize {
        self.display.push(item)
    }

    pub fn push_upstream(&mut self, item: UpstreamItem) {
        self.upstream.push(item);
    }

    /// Append a user message to both lists.
    pub fn push_user_message(&mut self, text: &str) {
        self.display
            .push(ConversationItem::Message(MessageItem::user(text)));
        self.upstream.push(UpstreamItem::user(text));
    }

    /// Append an assistant message to both lists.
    pub fn push_assistant_message(&mut self, text: &str) {
        self.display
            .push(ConversationItem::Message(MessageItem::assistant(None, text)));
        self.upstream.push(UpstreamItem::assistant(text));
    }

    /// Record a function call unless one with this call id is already present.
    pub fn record_function_call(&mut self, call_id: &str, name: &str, arguments: &str) -> bool {
        if self.has_function_call(call_id) {
            return false;
        }
        self.upstream
            .push(UpstreamItem::function_call(call_id, name, arguments));
        true
    }

    /// Record a function-call output at most once per call id.
    pub fn record_function_call_output(&mut self, call_id: &str, output: &str) -> bool {
        if self.has_function_call_output(call_id) {
            debug!(call_id, "function call output already recorded");
            return false;
        }
        self.upstream
            .push(UpstreamItem::function_call_output(call_id, output));
        true
    }

    pub fn has_function_call(&self, call_id: &str) -> bool {
        self.upstream
            .iter()
            .any(|item| item.is_function_call() && item.call_id() == Some(call_id))
    }

    pub fn has_function_call_output(&self, call_id: &str) -> bool {
        self.upstream
            .iter()
            .any(|item| item.is_function_call_output() && item.call_id() == Some(call_id))
    }

    /// The recorded function call for `call_id`, if any.
    pub fn function_call(&self, call_id: &str) -> Option<&UpstreamItem> {
        self.upstream
            .iter()
            .find(|item| item.is_function_call() && item.call_id() == Some(call_id))
    }

    /// Start over: both lists and the conversation id are cleared and the
    /// greeting, if any, is shown again.
    pub fn reset(&mut self) {
        self.display.clear();
        self.upstream.clear();
        self.conversation_id = None;
        self.seed_greeting();
    }

    fn seed_greeting(&mut self) {
        if let Some(greeting) = self.greeting.as_deref().map(str::trim) {
            if !greeting.is_empty() {
                let message = MessageItem::assistant(None, greeting);
                self.display.push(ConversationItem::Message(message));
            }
        }
    }
}
