//! Stream event records and their decoded, closed form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::item::{Annotation, RemoteToolInfo};
use crate::error::EquibotError;

/// One `{event, data}` envelope decoded from an SSE record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRecord {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl StreamRecord {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Build a record from an SSE record's `data:` payload.
    ///
    /// The payload is normally a `{event, data}` envelope. A bare upstream
    /// event (`{type, ...}`) or a payload under a named SSE `event:` field is
    /// accepted too.
    pub fn from_sse(event_field: Option<&str>, payload: &str) -> Result<Self, EquibotError> {
        let value: Value = serde_json::from_str(payload)?;
        if let Some(event) = value.get("event").and_then(Value::as_str) {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            return Ok(Self::new(event, data));
        }
        if let Some(event) = event_field.filter(|e| !e.is_empty() && *e != "message") {
            return Ok(Self::new(event, value));
        }
        if let Some(event) = value.get("type").and_then(Value::as_str) {
            return Ok(Self::new(event.to_string(), value));
        }
        Err(EquibotError::Decode(
            "SSE payload has no event name".to_string(),
        ))
    }
}

/// An output item as reported in `output_item.added` / `output_item.done`
/// events and in the final `response.completed` output list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub server_label: Option<String>,
    #[serde(default)]
    pub tools: Vec<RemoteToolInfo>,
}

impl OutputItem {
    /// The item's output rendered as a string (non-string JSON is serialized).
    pub fn output_text(&self) -> Option<String> {
        self.output.as_ref().and_then(value_to_text)
    }

    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().and_then(value_to_text)
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The closed set of stream events the interpreter understands.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Synthetic `meta.conversation` event carrying a freshly allocated id.
    ConversationAssigned { conversation_id: String },
    OutputTextDelta { item_id: Option<String>, delta: String },
    AnnotationAdded { item_id: Option<String>, annotation: Annotation },
    OutputItemAdded { item: OutputItem },
    OutputItemDone { item: OutputItem },
    FunctionArgumentsDelta { item_id: String, delta: String },
    FunctionArgumentsDone { item_id: String, arguments: String },
    McpArgumentsDelta { item_id: String, delta: String },
    McpArgumentsDone { item_id: String, arguments: String },
    SearchInProgress { item_id: String },
    SearchCompleted { item_id: String, output: Option<String> },
    CodeDelta { item_id: String, delta: String },
    CodeDone { item_id: String, code: String },
    CodeInterpreterCompleted { item_id: String },
    ResponseCompleted { output: Vec<OutputItem> },
    /// `error` and `response.failed` events.
    Failed { message: String },
    /// An event kind this crate does not act on.
    Ignored { kind: String },
}

#[derive(Deserialize)]
struct ConversationPayload {
    #[serde(default, rename = "conversationId")]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct TextPayload {
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    annotation: Option<Value>,
}

#[derive(Deserialize)]
struct ItemPayload {
    item: OutputItem,
}

#[derive(Deserialize)]
struct DeltaPayload {
    item_id: String,
    #[serde(default)]
    delta: String,
}

#[derive(Deserialize)]
struct ArgumentsDonePayload {
    item_id: String,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ItemRefPayload {
    item_id: String,
    #[serde(default)]
    output: Option<Value>,
}

#[derive(Deserialize)]
struct CodeDonePayload {
    item_id: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct CompletedPayload {
    response: CompletedResponse,
}

#[derive(Deserialize)]
struct CompletedResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<Value>,
}

impl StreamEvent {
    /// Decode a record into a typed event.
    ///
    /// Unknown event kinds decode to [`StreamEvent::Ignored`]; a known kind
    /// whose payload does not have the expected shape is an error.
    pub fn decode(record: StreamRecord) -> Result<Self, EquibotError> {
        let StreamRecord { event, data } = record;
        let event = match event.as_str() {
            "meta.conversation" => {
                let payload: ConversationPayload = serde_json::from_value(data)?;
                match payload.conversation_id.filter(|id| !id.is_empty()) {
                    Some(conversation_id) => Self::ConversationAssigned { conversation_id },
                    None => Self::Ignored { kind: event },
                }
            }
            "response.output_text.delta" => {
                let payload: TextPayload = serde_json::from_value(data)?;
                Self::OutputTextDelta {
                    item_id: payload.item_id,
                    delta: payload.delta.unwrap_or_default(),
                }
            }
            "response.output_text.annotation.added" => {
                let payload: TextPayload = serde_json::from_value(data)?;
                match payload.annotation {
                    Some(raw) => Self::AnnotationAdded {
                        item_id: payload.item_id,
                        annotation: Annotation::from_value(&raw),
                    },
                    None => Self::Ignored { kind: event },
                }
            }
            "response.output_item.added" => {
                let payload: ItemPayload = serde_json::from_value(data)?;
                Self::OutputItemAdded { item: payload.item }
            }
            "response.output_item.done" => {
                let payload: ItemPayload = serde_json::from_value(data)?;
                Self::OutputItemDone { item: payload.item }
            }
            "response.function_call_arguments.delta" => {
                let payload: DeltaPayload = serde_json::from_value(data)?;
                Self::FunctionArgumentsDelta {
                    item_id: payload.item_id,
                    delta: payload.delta,
                }
            }
            "response.function_call_arguments.done" => {
                let payload: ArgumentsDonePayload = serde_json::from_value(data)?;
                Self::FunctionArgumentsDone {
                    item_id: payload.item_id,
                    arguments: payload.arguments.unwrap_or_default(),
                }
            }
            "response.mcp_call_arguments.delta" | "response.mcp_call.arguments.delta" => {
                let payload: DeltaPayload = serde_json::from_value(data)?;
                Self::McpArgumentsDelta {
                    item_id: payload.item_id,
                    delta: payload.delta,
                }
            }
            "response.mcp_call_arguments.done" | "response.mcp_call.arguments.done" => {
                let payload: ArgumentsDonePayload = serde_json::from_value(data)?;
                Self::McpArgumentsDone {
                    item_id: payload.item_id,
                    arguments: payload.arguments.unwrap_or_default(),
                }
            }
            "response.web_search_call.in_progress"
            | "response.web_search_call.searching"
            | "response.file_search_call.in_progress"
            | "response.file_search_call.searching" => {
                let payload: ItemRefPayload = serde_json::from_value(data)?;
                Self::SearchInProgress {
                    item_id: payload.item_id,
                }
            }
            "response.web_search_call.completed" | "response.file_search_call.completed" => {
                let payload: ItemRefPayload = serde_json::from_value(data)?;
                Self::SearchCompleted {
                    item_id: payload.item_id,
                    output: payload.output.as_ref().and_then(value_to_text),
                }
            }
            "response.code_interpreter_call_code.delta"
            | "response.code_interpreter_call.code.delta" => {
                let payload: DeltaPayload = serde_json::from_value(data)?;
                Self::CodeDelta {
                    item_id: payload.item_id,
                    delta: payload.delta,
                }
            }
            "response.code_interpreter_call_code.done"
            | "response.code_interpreter_call.code.done" => {
                let payload: CodeDonePayload = serde_json::from_value(data)?;
                Self::CodeDone {
                    item_id: payload.item_id,
                    code: payload.code.unwrap_or_default(),
                }
            }
            "response.code_interpreter_call.completed" => {
                let payload: ItemRefPayload = serde_json::from_value(data)?;
                Self::CodeInterpreterCompleted {
                    item_id: payload.item_id,
                }
            }
            "response.completed" => {
                let payload: CompletedPayload = serde_json::from_value(data)?;
                Self::ResponseCompleted {
                    output: payload.response.output,
                }
            }
            "error" | "response.failed" => {
                let payload: ErrorPayload = serde_json::from_value(data)?;
                let nested = payload.response.as_ref().and_then(|r| {
                    r.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
                Self::Failed {
                    message: payload
                        .message
                        .or(nested)
                        .unwrap_or_else(|| "The model response failed.".to_string()),
                }
            }
            _ => Self::Ignored { kind: event },
        };
        Ok(event)
    }
}
