//! Shared test helpers: a scripted turn transport and record builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use equibot::error::{EquibotError, Result};
use equibot::tools::{FunctionTool, ToolDispatcher, ToolParameters, ToolRegistry};
use equibot::transport::{RecordStream, TurnRequest, TurnTransport};
use equibot::types::StreamRecord;

/// What the transport does for one turn.
pub enum Script {
    Records(Vec<StreamRecord>),
    /// The request is rejected before any record arrives.
    OpenError(EquibotError),
    /// Some records arrive, then the stream breaks.
    BreakAfter(Vec<StreamRecord>, EquibotError),
}

type Fallback = Box<dyn Fn(usize) -> Vec<StreamRecord> + Send + Sync>;

/// A transport that replays canned turns and remembers every request.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Fallback>,
    requests: Mutex<Vec<TurnRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(turns: Vec<Vec<StreamRecord>>) -> Self {
        Self::scripted(turns.into_iter().map(Script::Records).collect())
    }

    pub fn scripted(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every turn is produced by `turn(index)`.
    pub fn repeating<F>(turn: F) -> Self
    where
        F: Fn(usize) -> Vec<StreamRecord> + Send + Sync + 'static,
    {
        Self {
            fallback: Some(Box::new(turn)),
            ..Self::scripted(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_json(&self, index: usize) -> Value {
        serde_json::to_value(&self.requests()[index]).unwrap()
    }
}

#[async_trait]
impl TurnTransport for ScriptedTransport {
    async fn open_turn(&self, request: &TurnRequest) -> Result<RecordStream> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let script = self.scripts.lock().unwrap().pop_front();
        let items: Vec<Result<StreamRecord>> = match script {
            Some(Script::Records(records)) => records.into_iter().map(Ok).collect(),
            Some(Script::OpenError(error)) => return Err(error),
            Some(Script::BreakAfter(records, error)) => records
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
            None => match &self.fallback {
                Some(turn) => turn(index).into_iter().map(Ok).collect(),
                None => Vec::new(),
            },
        };
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn record(event: &str, data: Value) -> StreamRecord {
    StreamRecord::new(event, data)
}

pub fn conversation(id: &str) -> StreamRecord {
    record("meta.conversation", json!({ "conversationId": id }))
}

pub fn text_delta(item_id: &str, delta: &str) -> StreamRecord {
    record(
        "response.output_text.delta",
        json!({ "item_id": item_id, "delta": delta }),
    )
}

pub fn message_added(item_id: &str) -> StreamRecord {
    record(
        "response.output_item.added",
        json!({ "item": { "type": "message", "id": item_id, "role": "assistant" } }),
    )
}

/// Added, arguments-done and item-done records for one function call.
pub fn function_call(item_id: &str, call_id: &str, name: &str, arguments: Value) -> Vec<StreamRecord> {
    let arguments = arguments.to_string();
    vec![
        record(
            "response.output_item.added",
            json!({ "item": { "type": "function_call", "id": item_id, "name": name, "arguments": "" } }),
        ),
        record(
            "response.function_call_arguments.done",
            json!({ "item_id": item_id, "arguments": arguments }),
        ),
        record(
            "response.output_item.done",
            json!({ "item": {
                "type": "function_call",
                "id": item_id,
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
                "status": "completed"
            } }),
        ),
    ]
}

pub fn completed(output: Vec<Value>) -> StreamRecord {
    record(
        "response.completed",
        json!({ "response": { "output": output } }),
    )
}

/// A one-message turn: text deltas followed by `response.completed`.
pub fn answer(item_id: &str, text: &str) -> Vec<StreamRecord> {
    vec![message_added(item_id), text_delta(item_id, text), completed(vec![])]
}

pub fn ticker_params() -> ToolParameters {
    ToolParameters::object()
        .string("ticker", "Ticker symbol", true)
        .build()
}

/// Tool that echoes the ticker it was called with.
pub fn overview_tool() -> FunctionTool {
    FunctionTool::new(
        "get_company_overview",
        "Company overview",
        ticker_params(),
        |args| async move {
            let ticker = args.get_str("ticker")?.to_string();
            Ok(json!({ "name": "Apple Inc.", "ticker": ticker }))
        },
    )
}

pub fn dispatcher_with(tools: Vec<FunctionTool>) -> ToolDispatcher {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    ToolDispatcher::new(registry, std::time::Duration::from_secs(5))
}

pub fn shared(transport: ScriptedTransport) -> Arc<ScriptedTransport> {
    Arc::new(transport)
}
