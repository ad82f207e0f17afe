//! Applies stream events for one model turn to the conversation history.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use super::events::{EventEmitter, TurnEvent};
use crate::history::ConversationHistory;
use crate::types::{
    Annotation, ApprovalRequestItem, ContentKind, ConversationItem, MessageContent, MessageItem,
    OutputItem, StreamEvent, StreamRecord, ToolCallItem, ToolCallKind, ToolCatalogItem,
    UpstreamItem,
};
use crate::util::parse_partial;

/// A finished function call waiting to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub item_id: String,
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    pub parsed_arguments: Value,
}

/// Per-turn interpreter state.
///
/// A fresh interpreter is created for every model turn; the history it
/// mutates outlives it.
#[derive(Debug, Default)]
pub struct EventInterpreter {
    /// Display length when the turn began; items at or after it belong to
    /// this turn.
    turn_start: usize,
    text: String,
    function_arguments: HashMap<String, String>,
    mcp_arguments: HashMap<String, String>,
    pending: Vec<PendingCall>,
    pending_ids: HashSet<String>,
    added_items: HashSet<String>,
    had_tool_calls: bool,
    completed: bool,
    /// Display position of this turn's failure message; text never merges into it.
    failure_at: Option<usize>,
}

impl EventInterpreter {
    pub fn new(turn_start: usize) -> Self {
        Self {
            turn_start,
            ..Self::default()
        }
    }

    /// Whether any tool call (of any kind) appeared during this turn.
    pub fn had_tool_calls(&self) -> bool {
        self.had_tool_calls
    }

    pub fn pending(&self) -> &[PendingCall] {
        &self.pending
    }

    pub fn into_pending(self) -> Vec<PendingCall> {
        self.pending
    }

    /// Decode and apply one raw record. Undecodable records are dropped.
    pub(crate) fn handle_record(
        &mut self,
        history: &mut ConversationHistory,
        record: StreamRecord,
        emitter: &EventEmitter,
    ) {
        let kind = record.event.clone();
        match StreamEvent::decode(record) {
            Ok(event) => self.apply(history, event, emitter),
            Err(error) => warn!(event = kind.as_str(), %error, "dropping malformed stream event"),
        }
    }

    pub(crate) fn apply(
        &mut self,
        history: &mut ConversationHistory,
        event: StreamEvent,
        emitter: &EventEmitter,
    ) {
        match event {
            StreamEvent::ConversationAssigned { conversation_id } => {
                history.set_conversation_id(conversation_id);
            }
            StreamEvent::OutputTextDelta { item_id, delta } => {
                self.on_text(history, item_id, &delta, None, emitter);
            }
            StreamEvent::AnnotationAdded {
                item_id,
                annotation,
            } => {
                self.on_text(history, item_id, "", Some(annotation), emitter);
            }
            StreamEvent::OutputItemAdded { item } => self.on_item_added(history, item, emitter),
            StreamEvent::OutputItemDone { item } => self.on_item_done(history, item, emitter),
            StreamEvent::FunctionArgumentsDelta { item_id, delta } => {
                let buffer = self.function_arguments.entry(item_id.clone()).or_default();
                buffer.push_str(&delta);
                update_arguments(history, &item_id, buffer);
            }
            StreamEvent::FunctionArgumentsDone { item_id, arguments } => {
                update_arguments(history, &item_id, &arguments);
                self.function_arguments.insert(item_id, arguments);
            }
            StreamEvent::McpArgumentsDelta { item_id, delta } => {
                let buffer = self.mcp_arguments.entry(item_id.clone()).or_default();
                buffer.push_str(&delta);
                update_arguments(history, &item_id, buffer);
            }
            StreamEvent::McpArgumentsDone { item_id, arguments } => {
                update_arguments(history, &item_id, &arguments);
                if let Some(call) = history.display_mut().tool_call_mut(&item_id) {
                    if call.complete(None) {
                        emitter.emit(finished(call));
                    }
                }
                self.mcp_arguments.insert(item_id, arguments);
            }
            StreamEvent::SearchInProgress { item_id } => {
                if let Some(call) = history.display_mut().open_tool_call_mut(&item_id) {
                    call.mark_searching();
                }
            }
            StreamEvent::SearchCompleted { item_id, output } => {
                if let Some(call) = history.display_mut().open_tool_call_mut(&item_id) {
                    if call.complete(output) {
                        emitter.emit(finished(call));
                    }
                }
            }
            StreamEvent::CodeDelta { item_id, delta } => {
                if let Some(call) = open_code_call(history, &item_id) {
                    call.append_code(&delta);
                }
            }
            StreamEvent::CodeDone { item_id, code } => {
                if let Some(call) = open_code_call(history, &item_id) {
                    call.code = Some(code);
                    if call.complete(None) {
                        emitter.emit(finished(call));
                    }
                }
            }
            StreamEvent::CodeInterpreterCompleted { item_id } => {
                if let Some(call) = history.display_mut().tool_call_mut(&item_id) {
                    if call.complete(None) {
                        emitter.emit(finished(call));
                    }
                }
            }
            StreamEvent::ResponseCompleted { output } => self.on_completed(history, output, emitter),
            StreamEvent::Failed { message } => {
                warn!(message = message.as_str(), "model turn failed");
                let position = history.push_display(ConversationItem::Message(
                    MessageItem::assistant(None, message.clone()),
                ));
                self.failure_at = Some(position);
                emitter.emit(TurnEvent::TurnFailed { message });
            }
            StreamEvent::Ignored { kind } => {
                debug!(event = kind.as_str(), "ignoring stream event");
            }
        }
    }

    fn on_text(
        &mut self,
        history: &mut ConversationHistory,
        item_id: Option<String>,
        delta: &str,
        annotation: Option<Annotation>,
        emitter: &EventEmitter,
    ) {
        self.text.push_str(delta);
        let display = history.display_mut();
        let last_is_ours = display.len() > self.turn_start
            && self.failure_at != display.len().checked_sub(1);

        match display
            .trailing_assistant_message_mut(item_id.as_deref())
            .filter(|_| last_is_ours)
        {
            Some(message) => {
                if message.content.is_empty() {
                    message
                        .content
                        .push(MessageContent::new(ContentKind::OutputText, ""));
                }
                let part = &mut message.content[0];
                part.text.push_str(delta);
                part.annotations.extend(annotation);
            }
            None => {
                if delta.is_empty() && annotation.is_none() {
                    return;
                }
                let mut message = MessageItem::assistant(item_id.clone(), delta);
                message.content[0].annotations.extend(annotation);
                display.push(ConversationItem::Message(message));
            }
        }

        if !delta.is_empty() {
            emitter.emit(TurnEvent::TextDelta {
                item_id,
                delta: delta.to_string(),
            });
        }
    }

    fn on_item_added(
        &mut self,
        history: &mut ConversationHistory,
        item: OutputItem,
        emitter: &EventEmitter,
    ) {
        let Some(kind) = ToolCallKind::from_item_type(&item.kind) else {
            return;
        };
        let Some(id) = item.id.clone().filter(|id| !id.is_empty()) else {
            warn!(item_type = item.kind.as_str(), "tool call item without an id");
            return;
        };
        if !self.added_items.insert(id.clone()) {
            debug!(item_id = id.as_str(), "duplicate output_item.added");
            return;
        }
        self.had_tool_calls = true;

        let mut call = ToolCallItem::new(id.clone(), kind);
        call.name = item.name.clone();
        match kind {
            ToolCallKind::FunctionCall | ToolCallKind::McpCall => {
                let initial = item.arguments.clone().unwrap_or_default();
                call.set_arguments(initial.clone(), parse_arguments(&initial));
                let buffers = match kind {
                    ToolCallKind::FunctionCall => &mut self.function_arguments,
                    _ => &mut self.mcp_arguments,
                };
                buffers.insert(id.clone(), initial);
            }
            ToolCallKind::CodeInterpreterCall => call.code = Some(String::new()),
            ToolCallKind::WebSearchCall | ToolCallKind::FileSearchCall => {
                if item.status.as_deref() == Some("searching") {
                    call.mark_searching();
                }
            }
        }

        debug!(item_id = id.as_str(), kind = %kind, "tool call started");
        emitter.emit(TurnEvent::ToolCallStarted {
            item_id: id,
            kind,
            name: item.name,
        });
        history.push_display(ConversationItem::ToolCall(call));
    }

    fn on_item_done(
        &mut self,
        history: &mut ConversationHistory,
        item: OutputItem,
        emitter: &EventEmitter,
    ) {
        if item.kind == "reasoning" {
            return;
        }
        let Some(id) = item.id.as_deref() else {
            return;
        };
        let kind = ToolCallKind::from_item_type(&item.kind);

        if let (Some(call), Some(call_id)) =
            (history.display_mut().tool_call_mut(id), item.call_id.as_deref())
        {
            call.link_call_id(call_id);
        }

        match kind {
            Some(ToolCallKind::FunctionCall) => self.finish_function_call(history, id, &item),
            Some(ToolCallKind::McpCall) => {
                if let Some(call) = history.display_mut().tool_call_mut(id) {
                    let result = item.error_text().or_else(|| item.output_text());
                    if call.is_open() {
                        let changed = match item.error_text() {
                            Some(error) => call.fail(Some(error)),
                            None => call.complete(result),
                        };
                        if changed {
                            emitter.emit(finished(call));
                        }
                    } else if let Some(result) = result {
                        call.fill_output(result);
                    }
                }
            }
            Some(_) => {
                if let Some(call) = history.display_mut().tool_call_mut(id) {
                    let changed = match item.status.as_deref() {
                        Some("completed") => call.complete(item.output_text()),
                        Some("failed") => call.fail(item.output_text()),
                        _ => false,
                    };
                    if changed {
                        emitter.emit(finished(call));
                    }
                }
            }
            None => {}
        }
    }

    fn finish_function_call(&mut self, history: &mut ConversationHistory, id: &str, item: &OutputItem) {
        self.had_tool_calls = true;
        let arguments = self
            .function_arguments
            .get(id)
            .cloned()
            .or_else(|| item.arguments.clone())
            .unwrap_or_default();
        let parsed = parse_arguments(&arguments);

        let mut name = item.name.clone();
        if let Some(call) = history.display_mut().tool_call_mut(id) {
            call.set_arguments(arguments.clone(), parsed.clone());
            if name.is_none() {
                name = call.name.clone();
            }
        }

        let (Some(call_id), Some(name)) = (item.call_id.clone(), name) else {
            warn!(item_id = id, "function call finished without call id or name");
            return;
        };

        history.record_function_call(&call_id, &name, &arguments);
        if self.pending_ids.insert(call_id.clone()) {
            debug!(item_id = id, call_id = call_id.as_str(), tool = name.as_str(), "function call queued");
            self.pending.push(PendingCall {
                item_id: id.to_string(),
                call_id,
                name,
                arguments,
                parsed_arguments: parsed,
            });
        }
    }

    fn on_completed(
        &mut self,
        history: &mut ConversationHistory,
        output: Vec<OutputItem>,
        emitter: &EventEmitter,
    ) {
        for item in output {
            let Some(id) = item.id.clone().filter(|id| !history.display().contains(id)) else {
                continue;
            };
            match item.kind.as_str() {
                "mcp_list_tools" => {
                    history.push_display(ConversationItem::ToolCatalog(ToolCatalogItem {
                        id,
                        server_label: item.server_label.unwrap_or_default(),
                        tools: item.tools,
                    }));
                }
                "mcp_approval_request" => {
                    let request = ApprovalRequestItem {
                        id,
                        server_label: item.server_label.unwrap_or_default(),
                        name: item.name.unwrap_or_default(),
                        arguments: item.arguments,
                    };
                    emitter.emit(TurnEvent::ApprovalRequested {
                        request: request.clone(),
                    });
                    history.push_display(ConversationItem::ApprovalRequest(request));
                }
                _ => {}
            }
        }

        if self.completed {
            return;
        }
        self.completed = true;
        if !self.text.trim().is_empty() && !self.had_tool_calls {
            history.push_upstream(UpstreamItem::assistant(self.text.clone()));
        }
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        parse_partial(raw)
    }
}

fn update_arguments(history: &mut ConversationHistory, item_id: &str, raw: &str) {
    if let Some(call) = history.display_mut().tool_call_mut(item_id) {
        call.set_arguments(raw, parse_arguments(raw));
    }
}

fn open_code_call<'a>(history: &'a mut ConversationHistory, item_id: &str) -> Option<&'a mut ToolCallItem> {
    history
        .display_mut()
        .open_tool_call_mut(item_id)
        .filter(|call| call.kind == ToolCallKind::CodeInterpreterCall)
}

fn finished(call: &ToolCallItem) -> TurnEvent {
    TurnEvent::ToolCallFinished {
        item_id: call.id.clone(),
        status: call.status,
    }
}
