//! Turn transport: one streaming request per model turn.

pub mod http;
pub mod sse;

pub use http::HttpTurnTransport;
pub use sse::{SseDecoder, SseFrame};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ToolsState;
use crate::error::Result;
use crate::types::{StreamRecord, UpstreamItem};

/// Stream of decoded `{event, data}` records for one turn.
pub type RecordStream = BoxStream<'static, Result<StreamRecord>>;

/// Body posted to the turn endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub input_items: Vec<UpstreamItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub tools_state: ToolsState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Optional diagnostics attached to a turn request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub full_history: Vec<UpstreamItem>,
}

/// Opens the event stream for one turn.
///
/// Implementations report a failure to open the stream as `Err` and never
/// yield records they could not decode.
#[async_trait]
pub trait TurnTransport: Send + Sync {
    async fn open_turn(&self, request: &TurnRequest) -> Result<RecordStream>;
}

/// Drive one turn, handing every record to `sink` in arrival order.
///
/// Returns the number of records delivered. The first stream error ends the
/// turn and is returned; records already delivered stay delivered.
pub async fn stream_turn<F>(
    transport: &dyn TurnTransport,
    request: &TurnRequest,
    mut sink: F,
) -> Result<usize>
where
    F: FnMut(StreamRecord) + Send,
{
    let mut records = transport.open_turn(request).await?;
    let mut delivered = 0;
    while let Some(record) = records.next().await {
        sink(record?);
        delivered += 1;
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EquibotError;
    use serde_json::json;

    struct FixedTransport(Vec<Result<StreamRecord>>);

    #[async_trait]
    impl TurnTransport for FixedTransport {
        async fn open_turn(&self, _request: &TurnRequest) -> Result<RecordStream> {
            let items: Vec<Result<StreamRecord>> = self
                .0
                .iter()
                .map(|r| match r {
                    Ok(record) => Ok(record.clone()),
                    Err(e) => Err(EquibotError::Stream(e.to_string())),
                })
                .collect();
            Ok(futures::stream::iter(items).boxed())
        }
    }

    fn request() -> TurnRequest {
        TurnRequest {
            input_items: vec![UpstreamItem::user("hi")],
            conversation_id: None,
            tools_state: ToolsState::default(),
            debug: None,
        }
    }

    #[test]
    fn request_serializes_camel_case_and_omits_absent_fields() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["inputItems"], json!([{"role": "user", "content": "hi"}]));
        assert!(value.get("conversationId").is_none());
        assert!(value.get("debug").is_none());
        assert_eq!(value["toolsState"]["functionsEnabled"], json!(true));
    }

    #[tokio::test]
    async fn stream_errors_keep_earlier_records_delivered() {
        let transport = FixedTransport(vec![
            Ok(StreamRecord::new("a", json!({}))),
            Err(EquibotError::Stream("reset".into())),
            Ok(StreamRecord::new("b", json!({}))),
        ]);
        let mut seen = Vec::new();
        let result = stream_turn(&transport, &request(), |r| seen.push(r.event)).await;
        assert!(result.is_err());
        assert_eq!(seen, vec!["a".to_string()]);
    }
}
