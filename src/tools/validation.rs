//! Check tool arguments against the tool's parameter schema.

use serde_json::Value;

use super::types::ToolParameters;
use crate::error::EquibotError;

/// Top-level schema check: object shape, required keys, declared property
/// types and enum membership. Unknown keys are allowed.
pub fn validate_arguments(args: &Value, parameters: &ToolParameters) -> Result<(), EquibotError> {
    let schema = &parameters.schema;
    let Some(object) = args.as_object() else {
        return Err(invalid(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        )));
    };

    for name in parameters.required() {
        match object.get(name) {
            None | Some(Value::Null) => {
                return Err(invalid(format!("missing required field '{name}'")));
            }
            _ => {}
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in object {
        let Some(property) = properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let expected: Vec<&str> = match property.get("type") {
            Some(Value::String(single)) => vec![single.as_str()],
            Some(Value::Array(many)) => many.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !expected.is_empty() && !expected.iter().any(|t| matches_type(value, t)) {
            return Err(invalid(format!(
                "field '{key}' expected type '{}', got {}",
                expected.join("|"),
                json_type_name(value)
            )));
        }
        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(invalid(format!("field '{key}' has unsupported value {value}")));
            }
        }
    }
    Ok(())
}

fn invalid(message: String) -> EquibotError {
    EquibotError::InvalidArgument(message)
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
