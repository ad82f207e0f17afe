//! Model-facing conversation input items.
//!
//! These are the only shapes the upstream model accepts as conversation input
//! on the next turn. Serialization matches the wire format exactly: messages
//! carry no `type` tag, everything else does.

use serde::{Deserialize, Serialize};

use super::item::Role;

/// One item of the canonical upstream history or of a turn's input batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UpstreamItem {
    FunctionCall(FunctionCallRecord),
    FunctionCallOutput(FunctionCallOutputRecord),
    ApprovalResponse(ApprovalResponseRecord),
    Message(UpstreamMessage),
}

impl UpstreamItem {
    pub fn message(role: Role, content: impl Into<String>) -> Self {
        Self::Message(UpstreamMessage {
            role,
            content: content.into(),
        })
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::message(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::message(Role::Assistant, content)
    }

    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::FunctionCall(FunctionCallRecord {
            kind: FunctionCallTag::FunctionCall,
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        })
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput(FunctionCallOutputRecord {
            kind: FunctionCallOutputTag::FunctionCallOutput,
            call_id: call_id.into(),
            output: output.into(),
        })
    }

    pub fn approval_response(approval_request_id: impl Into<String>, approve: bool) -> Self {
        Self::ApprovalResponse(ApprovalResponseRecord {
            kind: ApprovalResponseTag::McpApprovalResponse,
            approval_request_id: approval_request_id.into(),
            approve,
        })
    }

    /// Call id of function-call and function-call-output records.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::FunctionCall(call) => Some(&call.call_id),
            Self::FunctionCallOutput(output) => Some(&output.call_id),
            _ => None,
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Self::FunctionCall(_))
    }

    pub fn is_function_call_output(&self) -> bool {
        matches!(self, Self::FunctionCallOutput(_))
    }
}

/// A plain role/text message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
enum FunctionCallTag {
    #[serde(rename = "function_call")]
    FunctionCall,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
enum FunctionCallOutputTag {
    #[serde(rename = "function_call_output")]
    FunctionCallOutput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
enum ApprovalResponseTag {
    #[serde(rename = "mcp_approval_response")]
    McpApprovalResponse,
}

/// A function call the model made; replayed only together with its output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCallRecord {
    #[serde(rename = "type")]
    kind: FunctionCallTag,
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// The serialized result of a function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCallOutputRecord {
    #[serde(rename = "type")]
    kind: FunctionCallOutputTag,
    pub call_id: String,
    pub output: String,
}

/// The user's decision on a remote tool approval request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalResponseRecord {
    #[serde(rename = "type")]
    kind: ApprovalResponseTag,
    pub approval_request_id: String,
    pub approve: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shapes_match_the_model_api() {
        assert_eq!(
            serde_json::to_value(UpstreamItem::user("hi")).unwrap(),
            json!({"role": "user", "content": "hi"})
        );
        assert_eq!(
            serde_json::to_value(UpstreamItem::function_call("call_1", "get_joke", "{}")).unwrap(),
            json!({"type": "function_call", "call_id": "call_1", "name": "get_joke", "arguments": "{}"})
        );
        assert_eq!(
            serde_json::to_value(UpstreamItem::function_call_output("call_1", "\"ok\"")).unwrap(),
            json!({"type": "function_call_output", "call_id": "call_1", "output": "\"ok\""})
        );
        assert_eq!(
            serde_json::to_value(UpstreamItem::approval_response("mcpr_1", true)).unwrap(),
            json!({"type": "mcp_approval_response", "approval_request_id": "mcpr_1", "approve": true})
        );
    }

    #[test]
    fn untagged_items_deserialize_to_the_right_variant() {
        let output: UpstreamItem = serde_json::from_value(json!({
            "type": "function_call_output", "call_id": "call_9", "output": "{}"
        }))
        .unwrap();
        assert!(output.is_function_call_output());
        assert_eq!(output.call_id(), Some("call_9"));

        let message: UpstreamItem =
            serde_json::from_value(json!({"role": "assistant", "content": "done"})).unwrap();
        assert_eq!(message, UpstreamItem::assistant("done"));
    }
}
