//! Convenience re-exports for common use.

pub use crate::config::{AssistantConfig, ToolsState};
pub use crate::error::{EquibotError, Result};
pub use crate::history::ConversationHistory;
pub use crate::tools::{
    http_function_registry, FunctionTool, Tool, ToolArguments, ToolDispatcher, ToolParameters,
    ToolRegistry,
};
pub use crate::transport::{HttpTurnTransport, TurnRequest, TurnTransport};
pub use crate::turn::{TurnEvent, TurnEventEnvelope, TurnOrchestrator, TurnOutcome, TurnStatus};
pub use crate::types::{ConversationItem, Role, StreamEvent, StreamRecord, UpstreamItem};
