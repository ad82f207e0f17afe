//! Input batch sanitization.
//!
//! Only four shapes may be submitted as turn input: role/text messages,
//! function-call records, function-call outputs and approval responses.
//! Anything else is dropped.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::types::{Role, UpstreamItem};

/// Where a batch comes from, which decides how outputs are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrigin {
    /// A batch that starts a user turn. Every function-call output must be
    /// preceded by its function call in the same batch.
    Fresh,
    /// Tool results continuing a turn whose calls the server already holds
    /// under the current conversation id.
    ToolContinuation,
}

/// Sanitize raw input items.
pub fn sanitize_batch(items: &[Value], origin: BatchOrigin) -> Vec<UpstreamItem> {
    let mut sanitized = Vec::with_capacity(items.len());
    let mut seen_calls: HashSet<String> = HashSet::new();

    for item in items {
        let Some(object) = item.as_object() else {
            continue;
        };
        let kind = object.get("type").and_then(Value::as_str);

        let accepted = match kind {
            Some("function_call") => {
                let call = function_call(item);
                if let Some(id) = call.as_ref().and_then(UpstreamItem::call_id) {
                    seen_calls.insert(id.to_string());
                }
                call
            }
            Some("function_call_output") => function_call_output(item).filter(|output| {
                origin == BatchOrigin::ToolContinuation
                    || output.call_id().is_some_and(|id| seen_calls.contains(id))
            }),
            Some("mcp_approval_response") => approval_response(item),
            Some("message") | None => message(item),
            Some(_) => None,
        };

        match accepted {
            Some(item) => sanitized.push(item),
            None => debug!(kind = kind.unwrap_or("message"), "dropping input item"),
        }
    }
    sanitized
}

/// Sanitize typed items by the same rules.
pub fn sanitize_items(items: &[UpstreamItem], origin: BatchOrigin) -> Vec<UpstreamItem> {
    let raw: Vec<Value> = items
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect();
    sanitize_batch(&raw, origin)
}

fn non_empty_str<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn function_call(item: &Value) -> Option<UpstreamItem> {
    let call_id = non_empty_str(item, "call_id")?;
    let name = non_empty_str(item, "name")?;
    let arguments = match item.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };
    Some(UpstreamItem::function_call(call_id, name, arguments))
}

fn function_call_output(item: &Value) -> Option<UpstreamItem> {
    let call_id = non_empty_str(item, "call_id")?;
    let output = item.get("output").and_then(Value::as_str)?;
    Some(UpstreamItem::function_call_output(call_id, output))
}

fn approval_response(item: &Value) -> Option<UpstreamItem> {
    let id = non_empty_str(item, "approval_request_id")?;
    let approve = match item.get("approve") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    };
    Some(UpstreamItem::approval_response(id, approve))
}

fn message(item: &Value) -> Option<UpstreamItem> {
    let role = match item.get("role").and_then(Value::as_str)? {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => return None,
    };
    Some(UpstreamItem::message(role, flatten_content(item.get("content"))))
}

/// Concatenate the text of any content shape.
pub fn flatten_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|part| match part {
                Value::String(s) => s.as_str(),
                Value::Object(_) => part.get("text").and_then(Value::as_str).unwrap_or(""),
                _ => "",
            })
            .collect(),
        Some(Value::Object(_)) => content
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        _ => String::new(),
    }
}
