//! Typed access to a tool call's parsed arguments.

use serde_json::Value;

use crate::error::EquibotError;

/// Arguments the model supplied for one tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, EquibotError> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| EquibotError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument; blank strings count as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Flatten top-level arguments into query parameters.
    ///
    /// Arrays become comma-joined values; nulls are skipped; nested objects
    /// are sent as JSON text.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let Some(map) = self.value.as_object() else {
            return Vec::new();
        };
        map.iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let text = match value {
                    Value::Array(values) => values
                        .iter()
                        .map(scalar_text)
                        .collect::<Vec<_>>()
                        .join(","),
                    other => scalar_text(other),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
