//! Append-ordered display list with id lookup.

use std::collections::HashMap;

use crate::types::{ConversationItem, MessageItem, ToolCallItem};

/// Items shown to the user, in append order, indexed by item id.
///
/// When two items share an id the most recently appended one is the one
/// returned by id lookups.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    items: Vec<ConversationItem>,
    positions: HashMap<String, usize>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and return its position.
    pub fn push(&mut self, item: ConversationItem) -> usize {
        let position = self.items.len();
        if let Some(id) = item.id() {
            self.positions.insert(id.to_string(), position);
        }
        self.items.push(item);
        position
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationItem> {
        self.items.last()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ConversationItem> {
        self.positions.get(id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ConversationItem> {
        let position = *self.positions.get(id)?;
        self.items.get_mut(position)
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCallItem> {
        self.get(id).and_then(ConversationItem::as_tool_call)
    }

    pub fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCallItem> {
        match self.get_mut(id) {
            Some(ConversationItem::ToolCall(call)) => Some(call),
            _ => None,
        }
    }

    /// The most recent tool call with this id that is still open.
    ///
    /// Scans backwards, so a repeated id resolves to the newest open call.
    pub fn open_tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCallItem> {
        self.items.iter_mut().rev().find_map(|item| match item {
            ConversationItem::ToolCall(call) if call.id == id && call.is_open() => Some(call),
            _ => None,
        })
    }

    /// Open tool calls at or after position `start`.
    pub fn open_tool_calls_since_mut(
        &mut self,
        start: usize,
    ) -> impl Iterator<Item = &mut ToolCallItem> + '_ {
        self.items
            .iter_mut()
            .skip(start)
            .filter_map(|item| match item {
                ConversationItem::ToolCall(call) if call.is_open() => Some(call),
                _ => None,
            })
    }

    /// The last item, when it is an assistant message with the given id.
    pub fn trailing_assistant_message_mut(&mut self, id: Option<&str>) -> Option<&mut MessageItem> {
        match self.items.last_mut() {
            Some(ConversationItem::Message(message))
                if message.role == crate::types::Role::Assistant && message.id.as_deref() == id =>
            {
                Some(message)
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
    }
}
