//! Turn orchestration: stream a model turn, run the tools it asked for, and
//! feed the results back until the model answers or the round limit trips.

pub mod events;
pub mod interpreter;
pub mod sanitize;

pub use events::{RunId, TurnEvent, TurnEventEnvelope, TurnEventSink};
pub use interpreter::{EventInterpreter, PendingCall};
pub use sanitize::{sanitize_batch, sanitize_items, BatchOrigin};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::config::{AssistantConfig, ToolsState, DEFAULT_MAX_TOOL_ROUNDS};
use crate::error::{ErrorCategory, EquibotError, Result};
use crate::history::ConversationHistory;
use crate::tools::{ToolDispatcher, ToolOutput};
use crate::transport::{stream_turn, DebugInfo, TurnRequest, TurnTransport};
use crate::types::{ConversationItem, MessageItem, UpstreamItem};
use events::EventEmitter;

/// Shown (and sent upstream) when the tool loop is cut off.
pub const LOOP_LIMIT_MESSAGE: &str = "I've hit the limit for tool calls in a single user turn. \
     Please rephrase or split your request and try again.";

/// Where the orchestrator is in a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Streaming,
    ToolExecution,
    LoopLimitReached,
}

/// How a user turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    /// The sanitized input was empty; nothing was sent.
    Skipped,
    /// The model finished without requesting further tools.
    Completed,
    /// The round limit stopped the tool loop.
    LoopLimitReached,
}

/// Result of processing one input batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub run_id: RunId,
    pub status: TurnStatus,
    /// Model turns streamed (transport calls made).
    pub turns: u32,
    /// Tool-execution rounds completed.
    pub tool_rounds: u32,
    pub finished_at: DateTime<Utc>,
}

impl TurnOutcome {
    fn new(run_id: RunId, status: TurnStatus, turns: u32, tool_rounds: u32) -> Self {
        Self {
            run_id,
            status,
            turns,
            tool_rounds,
            finished_at: Utc::now(),
        }
    }
}

/// Drives user turns against a [`TurnTransport`].
#[derive(Clone)]
pub struct TurnOrchestrator {
    transport: Arc<dyn TurnTransport>,
    dispatcher: ToolDispatcher,
    tools_state: ToolsState,
    max_tool_rounds: u32,
    parallel_tool_calls: bool,
    debug: bool,
    event_sink: Option<TurnEventSink>,
}

impl TurnOrchestrator {
    pub fn new(transport: Arc<dyn TurnTransport>, dispatcher: ToolDispatcher) -> Self {
        Self {
            transport,
            dispatcher,
            tools_state: ToolsState::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            parallel_tool_calls: false,
            debug: false,
            event_sink: None,
        }
    }

    pub fn from_config(
        config: &AssistantConfig,
        transport: Arc<dyn TurnTransport>,
        dispatcher: ToolDispatcher,
    ) -> Self {
        Self::new(transport, dispatcher)
            .with_tools_state(config.tools.clone())
            .with_max_tool_rounds(config.max_tool_rounds)
            .with_parallel_tool_calls(config.parallel_tool_calls)
            .with_debug(config.debug)
    }

    pub fn with_tools_state(mut self, tools_state: ToolsState) -> Self {
        self.tools_state = tools_state;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Append a user message and process it. Blank input is ignored.
    pub async fn send_user_message(
        &self,
        history: &mut ConversationHistory,
        text: &str,
    ) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::new(
                uuid::Uuid::new_v4(),
                TurnStatus::Skipped,
                0,
                0,
            ));
        }
        history.push_user_message(text);
        self.process(history, vec![UpstreamItem::user(text)]).await
    }

    /// Answer a remote tool approval request and let the model continue.
    pub async fn respond_to_approval(
        &self,
        history: &mut ConversationHistory,
        approval_request_id: &str,
        approve: bool,
    ) -> Result<TurnOutcome> {
        if approval_request_id.is_empty() {
            return Err(EquibotError::InvalidArgument(
                "approval request id is empty".to_string(),
            ));
        }
        let response = UpstreamItem::approval_response(approval_request_id, approve);
        history.push_upstream(response.clone());
        self.process(history, vec![response]).await
    }

    /// Process an input batch through as many model turns as the tool loop
    /// needs.
    ///
    /// Transport failures end the turn with `Err` after an assistant-visible
    /// error message is appended; everything already applied to `history`
    /// stays.
    pub async fn process(
        &self,
        history: &mut ConversationHistory,
        input: Vec<UpstreamItem>,
    ) -> Result<TurnOutcome> {
        let emitter = EventEmitter::new(self.event_sink.clone());
        let run_id = emitter.run_id();

        let mut batch = sanitize_items(&input, BatchOrigin::Fresh);
        if batch.is_empty() {
            debug!(%run_id, "empty input batch, nothing to send");
            return Ok(TurnOutcome::new(run_id, TurnStatus::Skipped, 0, 0));
        }

        let mut phase = TurnPhase::Idle;
        let mut turns = 0u32;
        let mut round = 0u32;

        loop {
            phase = transition(phase, TurnPhase::Streaming);
            turns += 1;
            emitter.emit(TurnEvent::TurnStarted {
                round,
                input_items: batch.len(),
            });

            let request = TurnRequest {
                input_items: batch,
                conversation_id: history.conversation_id().map(str::to_string),
                tools_state: self.tools_state.clone(),
                debug: self.debug.then(|| DebugInfo {
                    full_history: history.upstream().to_vec(),
                }),
            };

            let turn_start = history.display().len();
            let mut interpreter = EventInterpreter::new(turn_start);
            let streamed = stream_turn(self.transport.as_ref(), &request, |record| {
                interpreter.handle_record(history, record, &emitter)
            })
            .await;
            let pending = interpreter.into_pending();

            if let Err(error) = streamed {
                if error.is_transport() {
                    warn!(%run_id, round, %error, "turn stream failed");
                } else {
                    error!(%run_id, round, %error, "turn stream failed");
                }
                abandon_calls(history, turn_start, &pending, "turn stream failed", &emitter);
                history.push_display(ConversationItem::Message(MessageItem::assistant(
                    None,
                    failure_message(&error),
                )));
                emitter.emit(TurnEvent::TurnFailed {
                    message: error.to_string(),
                });
                return Err(error);
            }

            if pending.is_empty() {
                transition(phase, TurnPhase::Idle);
                info!(%run_id, turns, tool_rounds = round, "turn completed");
                return Ok(TurnOutcome::new(run_id, TurnStatus::Completed, turns, round));
            }

            if round >= self.max_tool_rounds {
                transition(phase, TurnPhase::LoopLimitReached);
                warn!(%run_id, rounds = round, pending = pending.len(), "tool loop limit reached");
                abandon_calls(history, turn_start, &pending, "tool loop limit reached", &emitter);
                history.push_assistant_message(LOOP_LIMIT_MESSAGE);
                emitter.emit(TurnEvent::LoopLimitReached { rounds: round });
                return Ok(TurnOutcome::new(
                    run_id,
                    TurnStatus::LoopLimitReached,
                    turns,
                    round,
                ));
            }

            phase = transition(phase, TurnPhase::ToolExecution);
            let outputs = self.execute_round(history, &pending, &emitter).await;
            round += 1;

            batch = continuation_batch(history, &pending, outputs);
            if batch.is_empty() {
                transition(phase, TurnPhase::Idle);
                return Ok(TurnOutcome::new(run_id, TurnStatus::Completed, turns, round));
            }
        }
    }

    /// Run every pending call and record its output.
    ///
    /// Outputs are returned in discovery order whether or not the calls ran
    /// concurrently.
    async fn execute_round(
        &self,
        history: &mut ConversationHistory,
        pending: &[PendingCall],
        emitter: &EventEmitter,
    ) -> Vec<UpstreamItem> {
        let results: Vec<Result<ToolOutput>> = if self.parallel_tool_calls {
            futures::future::join_all(
                pending
                    .iter()
                    .map(|call| self.dispatcher.dispatch(&call.name, &call.parsed_arguments)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(pending.len());
            for call in pending {
                results.push(
                    self.dispatcher
                        .dispatch(&call.name, &call.parsed_arguments)
                        .await,
                );
            }
            results
        };

        let mut outputs = Vec::with_capacity(pending.len());
        for (call, result) in pending.iter().zip(results) {
            let output = match result {
                Ok(output) => output,
                Err(EquibotError::UnknownTool(name)) => {
                    warn!(tool = name.as_str(), call_id = call.call_id.as_str(), "model called an unknown tool");
                    ToolOutput::error(format!("Unknown tool: {name}"))
                }
                Err(other) => ToolOutput::error(other.to_string()),
            };

            if let Some(item) = history.display_mut().tool_call_mut(&call.item_id) {
                let changed = if output.is_error {
                    item.fail(Some(output.output.clone()))
                } else {
                    item.complete(Some(output.output.clone()))
                };
                if changed {
                    emitter.emit(TurnEvent::ToolCallFinished {
                        item_id: item.id.clone(),
                        status: item.status,
                    });
                }
            }
            emitter.emit(TurnEvent::ToolResult {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                output: output.output.clone(),
                is_error: output.is_error,
            });

            history.record_function_call_output(&call.call_id, &output.output);
            outputs.push(UpstreamItem::function_call_output(
                call.call_id.clone(),
                output.output,
            ));
        }
        outputs
    }
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("dispatcher", &self.dispatcher)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Build the next turn's input from this round's outputs.
///
/// With a server-side conversation the outputs are enough. Without one, each
/// output is preceded by its function call so the batch stands on its own.
fn continuation_batch(
    history: &ConversationHistory,
    pending: &[PendingCall],
    outputs: Vec<UpstreamItem>,
) -> Vec<UpstreamItem> {
    if history.conversation_id().is_some() {
        return sanitize_items(&outputs, BatchOrigin::ToolContinuation);
    }

    let mut items = Vec::with_capacity(outputs.len() * 2);
    for (call, output) in pending.iter().zip(outputs) {
        let record = history.function_call(&call.call_id).cloned().unwrap_or_else(|| {
            UpstreamItem::function_call(call.call_id.clone(), call.name.clone(), call.arguments.clone())
        });
        items.push(record);
        items.push(output);
    }
    sanitize_items(&items, BatchOrigin::Fresh)
}

/// Close out calls that will never run.
///
/// Pending function calls get an error output so their upstream record stays
/// paired; every other call still open from this turn is marked failed.
fn abandon_calls(
    history: &mut ConversationHistory,
    turn_start: usize,
    pending: &[PendingCall],
    reason: &str,
    emitter: &EventEmitter,
) {
    let output = ToolOutput::error(reason);
    for call in pending {
        history.record_function_call_output(&call.call_id, &output.output);
        if let Some(item) = history.display_mut().tool_call_mut(&call.item_id) {
            if item.fail(Some(output.output.clone())) {
                emitter.emit(TurnEvent::ToolCallFinished {
                    item_id: item.id.clone(),
                    status: item.status,
                });
            }
        }
    }
    for item in history.display_mut().open_tool_calls_since_mut(turn_start) {
        if item.fail(None) {
            emitter.emit(TurnEvent::ToolCallFinished {
                item_id: item.id.clone(),
                status: item.status,
            });
        }
    }
}

fn transition(from: TurnPhase, to: TurnPhase) -> TurnPhase {
    debug!(%from, %to, "turn phase");
    to
}

/// Assistant-visible text for a failed turn.
fn failure_message(error: &EquibotError) -> String {
    match (error.category(), error) {
        (_, EquibotError::Api { status, message }) => {
            format!("Sorry, the assistant is unavailable right now (HTTP {status}): {message}")
        }
        (_, EquibotError::Timeout(_)) => {
            "Sorry, the response took too long and was stopped. Please try again.".to_string()
        }
        (ErrorCategory::Transport, other) => {
            format!("Sorry, the connection to the assistant was lost: {other}")
        }
        (ErrorCategory::Decode, _) => {
            "Sorry, the assistant sent a response that could not be read.".to_string()
        }
        (_, other) => format!("Sorry, something went wrong while answering: {other}"),
    }
}
