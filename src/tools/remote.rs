//! Function tools served over HTTP.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::types::ToolParameters;
use crate::error::EquibotError;

/// Calls `GET {base_url}/{name}?{arguments}` and returns the JSON body.
#[derive(Debug, Clone)]
pub struct HttpFunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpFunctionTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            base_url: base_url.into(),
            client,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.name)
    }
}

#[async_trait]
impl Tool for HttpFunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value, EquibotError> {
        let url = self.url();
        let query = args.to_query_pairs();
        debug!(tool = self.name.as_str(), url = url.as_str(), "calling function endpoint");

        let mut request = self.client.get(&url).query(&query);
        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                request = request.header(AUTHORIZATION, value);
            }
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EquibotError::tool(&self.name, e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| EquibotError::tool(&self.name, e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));
            return Err(EquibotError::tool(&self.name, message));
        }

        serde_json::from_str(&body).map_err(|e| {
            EquibotError::tool(&self.name, format!("response is not valid JSON: {e}"))
        })
    }
}
