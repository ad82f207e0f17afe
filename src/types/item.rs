//! Display-facing conversation items.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Anything shown to the user in the chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message(MessageItem),
    ToolCall(ToolCallItem),
    #[serde(rename = "mcp_list_tools")]
    ToolCatalog(ToolCatalogItem),
    #[serde(rename = "mcp_approval_request")]
    ApprovalRequest(ApprovalRequestItem),
}

impl ConversationItem {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message(m) => m.id.as_deref(),
            Self::ToolCall(t) => Some(&t.id),
            Self::ToolCatalog(c) => Some(&c.id),
            Self::ApprovalRequest(a) => Some(&a.id),
        }
    }

    pub fn as_message(&self) -> Option<&MessageItem> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallItem> {
        match self {
            Self::ToolCall(t) => Some(t),
            _ => None,
        }
    }
}

/// Kind of a message content part.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    InputText,
    OutputText,
    Refusal,
}

/// A chat message with one or more text parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageItem {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: Vec<MessageContent>,
}

impl MessageItem {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            id: None,
            content: vec![MessageContent::new(ContentKind::InputText, text)],
        }
    }

    pub fn assistant(id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            id,
            content: vec![MessageContent::new(ContentKind::OutputText, text)],
        }
    }

    /// Concatenated text of all content parts.
    pub fn text(&self) -> String {
        self.content.iter().map(|part| part.text.as_str()).collect()
    }
}

/// One text part of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl MessageContent {
    pub fn new(kind: ContentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            annotations: Vec::new(),
        }
    }
}

/// A source citation attached to output text.
///
/// The stream reports file and container references as either `file_id` or
/// `fileId` (likewise `container_id` / `containerId`); both land in the same
/// field here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Annotation {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
}

impl Annotation {
    /// Normalize a raw annotation payload from the stream.
    pub fn from_value(raw: &Value) -> Self {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| raw.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };
        Self {
            kind: text(&["type"]).unwrap_or_default(),
            file_id: text(&["file_id", "fileId"]),
            container_id: text(&["container_id", "containerId"]),
            filename: text(&["filename"]),
            url: text(&["url"]),
            title: text(&["title"]),
            index: raw.get("index").and_then(Value::as_u64),
        }
    }
}

/// Which tool family produced a tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallKind {
    FunctionCall,
    FileSearchCall,
    WebSearchCall,
    McpCall,
    CodeInterpreterCall,
}

impl ToolCallKind {
    /// Map a stream item `type` to a tool-call kind.
    pub fn from_item_type(item_type: &str) -> Option<Self> {
        item_type.parse().ok()
    }
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStatus {
    InProgress,
    Searching,
    Completed,
    Failed,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A tool call as shown to the user.
///
/// Once the status is terminal, every mutator is a no-op and returns `false`,
/// except [`ToolCallItem::fill_output`], which may still supply a missing
/// output without touching the status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallItem {
    pub id: String,
    #[serde(rename = "tool_type")]
    pub kind: ToolCallKind,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub parsed_arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ToolCallItem {
    pub fn new(id: impl Into<String>, kind: ToolCallKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: ToolCallStatus::InProgress,
            name: None,
            call_id: None,
            arguments: String::new(),
            parsed_arguments: Value::Object(Default::default()),
            output: None,
            code: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn set_arguments(&mut self, raw: impl Into<String>, parsed: Value) -> bool {
        if !self.is_open() {
            return false;
        }
        self.arguments = raw.into();
        self.parsed_arguments = parsed;
        true
    }

    /// Attach the correlation id; an id already set is kept.
    pub fn link_call_id(&mut self, call_id: &str) -> bool {
        if !self.is_open() || self.call_id.is_some() {
            return false;
        }
        self.call_id = Some(call_id.to_string());
        true
    }

    pub fn append_code(&mut self, delta: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.code.get_or_insert_with(String::new).push_str(delta);
        true
    }

    pub fn mark_searching(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = ToolCallStatus::Searching;
        true
    }

    /// Transition to `completed`, attaching `output` when given.
    pub fn complete(&mut self, output: Option<String>) -> bool {
        self.finish(ToolCallStatus::Completed, output)
    }

    /// Transition to `failed`, attaching `output` when given.
    pub fn fail(&mut self, output: Option<String>) -> bool {
        self.finish(ToolCallStatus::Failed, output)
    }

    /// Attach `output` only if none is recorded yet. The status is unchanged.
    pub fn fill_output(&mut self, output: String) -> bool {
        if self.output.is_some() {
            return false;
        }
        self.output = Some(output);
        true
    }

    fn finish(&mut self, status: ToolCallStatus, output: Option<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        if output.is_some() {
            self.output = output;
        }
        self.status = status;
        true
    }
}

/// A remote tool server's advertised tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCatalogItem {
    pub id: String,
    pub server_label: String,
    #[serde(default)]
    pub tools: Vec<RemoteToolInfo>,
}

/// One advertised remote tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A remote tool invocation waiting for the user to approve or deny it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequestItem {
    pub id: String,
    pub server_label: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotation_normalizes_camel_case_references() {
        let camel = Annotation::from_value(&json!({
            "type": "container_file_citation",
            "fileId": "file_1",
            "containerId": "cntr_1",
        }));
        let snake = Annotation::from_value(&json!({
            "type": "container_file_citation",
            "file_id": "file_1",
            "container_id": "cntr_1",
        }));
        assert_eq!(camel, snake);
        assert_eq!(camel.file_id.as_deref(), Some("file_1"));
        assert_eq!(camel.container_id.as_deref(), Some("cntr_1"));
    }

    #[test]
    fn terminal_tool_calls_are_immutable() {
        let mut call = ToolCallItem::new("fc_1", ToolCallKind::FunctionCall);
        assert!(call.complete(Some("{}".into())));
        assert!(!call.fail(Some("late".into())));
        assert!(!call.set_arguments("{\"a\":1}", json!({"a": 1})));
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(call.output.as_deref(), Some("{}"));
        assert!(!call.fill_output("late".into()));
    }

    #[test]
    fn fill_output_supplies_a_missing_output_once() {
        let mut call = ToolCallItem::new("mcp_1", ToolCallKind::McpCall);
        assert!(call.complete(None));
        assert!(call.fill_output("answer".into()));
        assert!(!call.fill_output("again".into()));
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(call.output.as_deref(), Some("answer"));
    }

    #[test]
    fn tool_call_kind_parses_item_types() {
        assert_eq!(
            ToolCallKind::from_item_type("code_interpreter_call"),
            Some(ToolCallKind::CodeInterpreterCall)
        );
        assert_eq!(ToolCallKind::from_item_type("reasoning"), None);
    }

    #[test]
    fn conversation_items_serialize_with_wire_tags() {
        let item = ConversationItem::ToolCall(ToolCallItem::new("ws_1", ToolCallKind::WebSearchCall));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["tool_type"], "web_search_call");
        assert_eq!(value["status"], "in_progress");
    }
}
