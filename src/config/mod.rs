//! Configuration system (layered: code > env > config file > defaults).

pub mod tools_state;

pub use tools_state::{McpConfig, ToolsState, VectorStore};

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::error::{EquibotError, Result};

pub const DEFAULT_TURN_ENDPOINT: &str = "http://localhost:3000/api/turn_response";
pub const DEFAULT_FUNCTIONS_URL: &str = "http://localhost:3000/api/functions";
pub const DEFAULT_GREETING: &str = "Hi, how can I help you?";
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 4;

/// Runtime configuration for the assistant.
///
/// Resolution order, lowest to highest:
/// 1. Built-in defaults
/// 2. TOML config file (`<config dir>/equibot/config.toml` or an explicit path)
/// 3. Environment variables (a `.env` file is loaded first when present)
/// 4. Values set in code or from CLI flags
#[derive(Debug, Clone, Builder)]
pub struct AssistantConfig {
    /// Streaming turn endpoint (POST, answers with `text/event-stream`).
    #[builder(into, default = DEFAULT_TURN_ENDPOINT.to_string())]
    pub turn_endpoint: String,
    /// Base URL the HTTP function tools are served under.
    #[builder(into, default = DEFAULT_FUNCTIONS_URL.to_string())]
    pub functions_base_url: String,
    /// Optional bearer token sent to both endpoints.
    #[builder(into)]
    pub api_key: Option<String>,
    /// Tool-execution rounds allowed per user turn before the loop is cut off.
    #[builder(default = DEFAULT_MAX_TOOL_ROUNDS)]
    pub max_tool_rounds: u32,
    #[builder(default = Duration::from_secs(10))]
    pub connect_timeout: Duration,
    /// Longest wait for the next chunk of a turn stream.
    #[builder(default = Duration::from_secs(120))]
    pub stream_idle_timeout: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub tool_timeout: Duration,
    /// Run the tool calls of one round concurrently.
    #[builder(default = false)]
    pub parallel_tool_calls: bool,
    /// Attach the full upstream history to each request as `debug.fullHistory`.
    #[builder(default = false)]
    pub debug: bool,
    #[builder(default)]
    pub tools: ToolsState,
    /// Assistant message seeded into a fresh conversation.
    #[builder(into)]
    pub greeting: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::builder().greeting(DEFAULT_GREETING).build()
    }
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub turn_endpoint: Option<String>,
    pub functions_base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tool_rounds: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub parallel_tool_calls: Option<bool>,
    pub debug: Option<bool>,
    pub greeting: Option<String>,
    pub tools: Option<ToolsState>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

impl AssistantConfig {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();

        let file = match path {
            Some(path) => Some(FileConfig::read(path)?),
            None => match default_config_path() {
                Some(path) if path.is_file() => Some(FileConfig::read(&path)?),
                _ => None,
            },
        };
        if let Some(file) = file {
            config.merge_file(file);
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay every key present in `file`.
    pub fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.turn_endpoint {
            self.turn_endpoint = v;
        }
        if let Some(v) = file.functions_base_url {
            self.functions_base_url = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = Some(v);
        }
        if let Some(v) = file.max_tool_rounds {
            self.max_tool_rounds = v;
        }
        if let Some(v) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.stream_idle_timeout_secs {
            self.stream_idle_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.tool_timeout_secs {
            self.tool_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.parallel_tool_calls {
            self.parallel_tool_calls = v;
        }
        if let Some(v) = file.debug {
            self.debug = v;
        }
        if let Some(v) = file.greeting {
            self.greeting = Some(v).filter(|g| !g.trim().is_empty());
        }
        if let Some(v) = file.tools {
            self.tools = v;
        }
    }

    /// Overlay `EQUIBOT_*` variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EQUIBOT_TURN_ENDPOINT") {
            self.turn_endpoint = v;
        }
        if let Some(v) = lookup("EQUIBOT_FUNCTIONS_URL") {
            self.functions_base_url = v;
        }
        if let Some(v) = lookup("EQUIBOT_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("EQUIBOT_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = v.trim().parse().map_err(|_| {
                EquibotError::Configuration(format!("EQUIBOT_MAX_TOOL_ROUNDS is not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup("EQUIBOT_DEBUG") {
            self.debug = parse_flag(&v).ok_or_else(|| {
                EquibotError::Configuration(format!("EQUIBOT_DEBUG is not a boolean: {v}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("turn_endpoint", &self.turn_endpoint),
            ("functions_base_url", &self.functions_base_url),
        ] {
            let parsed = reqwest::Url::parse(url).map_err(|e| {
                EquibotError::Configuration(format!("{name} is not a valid URL ({e}): {url:?}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(EquibotError::Configuration(format!(
                    "{name} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}

/// `<platform config dir>/equibot/config.toml`, when a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "equibot")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
