//! Tool parameter schemas and catalog definitions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameters {
    pub schema: Value,
}

impl ToolParameters {
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// A schema with no parameters.
    pub fn empty() -> Self {
        Self::object().build()
    }

    pub fn object() -> ParameterBuilder {
        ParameterBuilder::default()
    }

    /// Names listed as required by the schema.
    pub fn required(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Builder for object parameter schemas.
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description.into()}),
            required,
        )
    }

    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description.into(), "enum": values}),
            required,
        )
    }

    /// A list of strings that may also arrive as one comma-separated string.
    pub fn string_list(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({
                "type": ["string", "array"],
                "items": {"type": "string"},
                "description": description.into(),
            }),
            required,
        )
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "number", "description": description.into()}),
            required,
        )
    }

    fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

/// A function tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    #[serde(default)]
    pub strict: bool,
}
