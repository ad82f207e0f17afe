//! HTTP turn transport over `text/event-stream`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use super::sse::SseDecoder;
use super::{RecordStream, TurnRequest, TurnTransport};
use crate::config::AssistantConfig;
use crate::error::{EquibotError, Result};
use crate::types::StreamRecord;

/// Posts turn requests to the streaming turn endpoint.
#[derive(Debug, Clone)]
pub struct HttpTurnTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    idle_timeout: Duration,
}

impl HttpTurnTransport {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.turn_endpoint.clone(),
            api_key: config.api_key.clone(),
            idle_timeout: config.stream_idle_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = match &self.api_key {
            Some(key) => bearer_headers(key),
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers
            }
        };
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers
    }
}

#[async_trait]
impl TurnTransport for HttpTurnTransport {
    async fn open_turn(&self, request: &TurnRequest) -> Result<RecordStream> {
        debug!(
            endpoint = self.endpoint.as_str(),
            items = request.input_items.len(),
            conversation_id = request.conversation_id.as_deref().unwrap_or(""),
            "opening turn stream"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers())
            .json(request)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        Ok(decode_records(resp.bytes_stream(), self.idle_timeout))
    }
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Turn an error response into an API error, preferring the `{error}` body.
pub fn status_to_error(status: u16, body: &str) -> EquibotError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("error") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_string());
    EquibotError::api(status, message)
}

/// Decode a raw byte stream into turn records.
///
/// Ends at `[DONE]` or end of input. Waiting longer than `idle_timeout` for
/// a chunk yields [`EquibotError::Timeout`]. Records whose payload cannot be
/// decoded are dropped with a warning.
pub fn decode_records<S, B, E>(bytes: S, idle_timeout: Duration) -> RecordStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<EquibotError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut saw_done = false;
        futures::pin_mut!(bytes);

        loop {
            let next = match tokio::time::timeout(idle_timeout, bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    yield Err(EquibotError::Timeout(idle_timeout.as_millis() as u64));
                    break;
                }
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    yield Err(e.into());
                    break;
                }
                None => break,
            };

            for frame in decoder.push(chunk.as_ref()) {
                if frame.is_done() {
                    saw_done = true;
                    break;
                }
                match StreamRecord::from_sse(frame.event.as_deref(), &frame.data) {
                    Ok(record) => yield Ok(record),
                    Err(error) => {
                        warn!(%error, data = %frame.data, "dropping undecodable stream record");
                    }
                }
            }

            if saw_done {
                break;
            }
        }

        if !saw_done {
            decoder.finish();
        }
    };
    Box::pin(stream)
}
