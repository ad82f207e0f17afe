//! Observer events emitted while a user turn is processed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ApprovalRequestItem, ToolCallKind, ToolCallStatus};

/// Identifies one `process` call, across all of its model turns.
pub type RunId = Uuid;

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    TurnStarted {
        round: u32,
        input_items: usize,
    },
    TextDelta {
        item_id: Option<String>,
        delta: String,
    },
    ToolCallStarted {
        item_id: String,
        kind: ToolCallKind,
        name: Option<String>,
    },
    ToolCallFinished {
        item_id: String,
        status: ToolCallStatus,
    },
    ApprovalRequested {
        request: ApprovalRequestItem,
    },
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
    LoopLimitReached {
        rounds: u32,
    },
    TurnFailed {
        message: String,
    },
}

/// Envelope delivered to a [`TurnEventSink`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnEventEnvelope {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: TurnEvent,
}

/// Callback receiving turn events as they happen.
pub type TurnEventSink = Arc<dyn Fn(TurnEventEnvelope) + Send + Sync>;

/// Stamps events for one run and forwards them to the sink, if any.
pub(crate) struct EventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<TurnEventSink>,
}

impl EventEmitter {
    pub(crate) fn new(sink: Option<TurnEventSink>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            seq: AtomicU64::new(0),
            sink,
        }
    }

    pub(crate) fn run_id(&self) -> RunId {
        self.run_id
    }

    pub(crate) fn emit(&self, event: TurnEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        sink(TurnEventEnvelope {
            run_id: self.run_id,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            event,
        });
    }
}
