//! Error types for equibot.

use thiserror::Error;

/// Primary error type for all equibot operations.
#[derive(Error, Debug)]
pub enum EquibotError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Broad error category used to pick user-facing wording and log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Decode,
    Tool,
    Configuration,
    Other,
}

impl EquibotError {
    /// Create an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Api { .. } | Self::Network(_) | Self::Timeout(_) | Self::Stream(_) => {
                ErrorCategory::Transport
            }
            Self::Decode(_) | Self::Serialization(_) => ErrorCategory::Decode,
            Self::ToolExecution { .. } | Self::UnknownTool(_) | Self::InvalidArgument(_) => {
                ErrorCategory::Tool
            }
            Self::Configuration(_) | Self::ConfigFile(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether the error came from opening or reading a turn stream.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EquibotError>;
