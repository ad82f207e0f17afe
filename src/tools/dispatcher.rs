//! Tool registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::types::ToolDefinition;
use super::validation::validate_arguments;
use crate::error::{EquibotError, Result};
use crate::util::timeout::with_timeout;

/// Serialized result of one tool invocation, ready for a function-call output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub output: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(value: &Value) -> Self {
        Self {
            output: value.to_string(),
            is_error: false,
        }
    }

    /// An `{"error": message}` result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: json!({ "error": message.into() }).to_string(),
            is_error: true,
        }
    }
}

/// Name-indexed set of tools, kept in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    /// Add a tool; a tool already registered under the same name is replaced.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Runs tools by name.
///
/// The only error [`ToolDispatcher::dispatch`] returns is
/// [`EquibotError::UnknownTool`]; every failure inside a tool (including
/// invalid arguments and timeouts) comes back as an error [`ToolOutput`].
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, arguments: &Value) -> Result<ToolOutput> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| EquibotError::UnknownTool(name.to_string()))?;

        let result = match validate_arguments(arguments, tool.parameters()) {
            Ok(()) => {
                let args = ToolArguments::new(arguments.clone());
                with_timeout(self.timeout, tool.execute(&args)).await
            }
            Err(e) => Err(e),
        };

        Ok(match result {
            Ok(value) => {
                debug!(tool = name, "tool call succeeded");
                match value.get("error") {
                    Some(Value::String(_)) if value.as_object().is_some_and(|o| o.len() == 1) => {
                        ToolOutput {
                            output: value.to_string(),
                            is_error: true,
                        }
                    }
                    _ => ToolOutput::success(&value),
                }
            }
            Err(error) => {
                warn!(tool = name, %error, "tool call failed");
                ToolOutput::error(error_message(&error))
            }
        })
    }
}

/// The message shown to the model for a failed tool call.
fn error_message(error: &EquibotError) -> String {
    match error {
        EquibotError::ToolExecution { message, .. } => message.clone(),
        EquibotError::InvalidArgument(message) => message.clone(),
        other => other.to_string(),
    }
}
