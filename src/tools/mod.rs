//! Tool system for function calling.

pub mod arguments;
pub mod catalog;
pub mod dispatcher;
pub mod remote;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use catalog::{function_catalog, http_function_registry};
pub use dispatcher::{ToolDispatcher, ToolOutput, ToolRegistry};
pub use remote::HttpFunctionTool;
pub use tool::{FunctionTool, Tool};
pub use types::{ToolDefinition, ToolParameters};
