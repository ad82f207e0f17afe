//! Tool capability toggles forwarded with every turn request.

use serde::{Deserialize, Serialize};

/// Which tool families the turn endpoint should enable.
///
/// The engine never interprets these flags; they are forwarded verbatim as
/// `toolsState` so the endpoint can assemble the model's tool list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsState {
    pub web_search_enabled: bool,
    pub file_search_enabled: bool,
    pub functions_enabled: bool,
    pub code_interpreter_enabled: bool,
    pub google_integration_enabled: bool,
    pub mcp_enabled: bool,
    pub mcp_config: McpConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<VectorStore>,
}

impl Default for ToolsState {
    fn default() -> Self {
        Self {
            web_search_enabled: false,
            file_search_enabled: true,
            functions_enabled: true,
            code_interpreter_enabled: false,
            google_integration_enabled: false,
            mcp_enabled: false,
            mcp_config: McpConfig::default(),
            vector_store: None,
        }
    }
}

/// Remote tool server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct McpConfig {
    pub server_label: String,
    pub server_url: String,
    /// Comma-separated allow list; empty allows every advertised tool.
    pub allowed_tools: String,
    pub skip_approval: bool,
}

/// The vector store searched by file search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorStore {
    pub id: String,
    pub name: String,
}
