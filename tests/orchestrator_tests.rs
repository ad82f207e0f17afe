//! End-to-end tests for the turn orchestrator against a scripted transport.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;
use equibot::error::EquibotError;
use equibot::history::ConversationHistory;
use equibot::tools::{FunctionTool, ToolDispatcher};
use equibot::turn::{
    TurnEvent, TurnEventEnvelope, TurnEventSink, TurnOrchestrator, TurnStatus, LOOP_LIMIT_MESSAGE,
};
use equibot::types::{ConversationItem, Role, ToolCallStatus, UpstreamItem};

fn orchestrator(transport: Arc<ScriptedTransport>, dispatcher: ToolDispatcher) -> TurnOrchestrator {
    TurnOrchestrator::new(transport, dispatcher)
}

fn collecting_sink() -> (Arc<Mutex<Vec<TurnEventEnvelope>>>, TurnEventSink) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: TurnEventSink = Arc::new(move |envelope: TurnEventEnvelope| {
        sink_events.lock().unwrap().push(envelope);
    });
    (events, sink)
}

fn last_assistant_text(history: &ConversationHistory) -> String {
    history
        .display()
        .items()
        .iter()
        .rev()
        .find_map(|item| match item {
            ConversationItem::Message(m) if m.role == Role::Assistant => Some(m.text()),
            _ => None,
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn function_call_output_is_the_whole_continuation_batch() {
    let mut first = vec![conversation("conv_1")];
    first.extend(function_call(
        "fc_1",
        "call_1",
        "get_company_overview",
        json!({"ticker": "AAPL.US"}),
    ));
    first.push(completed(vec![]));
    let transport = shared(ScriptedTransport::new(vec![
        first,
        answer("msg_1", "Apple Inc. is a technology company."),
    ]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()]));
    let mut history = ConversationHistory::with_greeting("Hi, how can I help you?");

    let outcome = orch
        .send_user_message(&mut history, "What is AAPL's overview?")
        .await
        .unwrap();

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.tool_rounds, 1);
    assert_eq!(transport.call_count(), 2);

    let requests = transport.requests();
    assert_eq!(requests[0].input_items, vec![UpstreamItem::user("What is AAPL's overview?")]);
    assert!(requests[0].conversation_id.is_none());
    assert_eq!(requests[1].conversation_id.as_deref(), Some("conv_1"));
    assert_eq!(
        requests[1].input_items,
        vec![UpstreamItem::function_call_output(
            "call_1",
            json!({"name": "Apple Inc.", "ticker": "AAPL.US"}).to_string()
        )]
    );

    let call = history.display().tool_call("fc_1").unwrap();
    assert_eq!(call.status, ToolCallStatus::Completed);
    assert_eq!(call.call_id.as_deref(), Some("call_1"));
    assert!(call.output.as_deref().unwrap().contains("Apple Inc."));
    assert_eq!(
        history.display().last().unwrap().as_message().unwrap().text(),
        "Apple Inc. is a technology company."
    );
}

#[tokio::test]
async fn plain_answer_adds_one_upstream_assistant_entry() {
    let transport = shared(ScriptedTransport::new(vec![vec![
        message_added("msg_1"),
        text_delta("msg_1", "Markets "),
        text_delta("msg_1", "closed higher."),
        completed(vec![]),
    ]]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![]));
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "How did markets do?")
        .await
        .unwrap();

    assert_eq!(
        history.upstream(),
        &[
            UpstreamItem::user("How did markets do?"),
            UpstreamItem::assistant("Markets closed higher."),
        ]
    );
    let last = history.display().last().unwrap().as_message().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.text(), "Markets closed higher.");
}

#[tokio::test]
async fn empty_batch_makes_no_network_calls() {
    let transport = shared(ScriptedTransport::new(vec![]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![]));
    let mut history = ConversationHistory::new();

    let outcome = orch
        .process(
            &mut history,
            vec![UpstreamItem::function_call_output("orphan", "{}")],
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, TurnStatus::Skipped);

    let blank = orch.send_user_message(&mut history, "   ").await.unwrap();
    assert_eq!(blank.status, TurnStatus::Skipped);
    assert_eq!(transport.call_count(), 0);
    assert!(history.display().is_empty());
}

#[tokio::test]
async fn tool_loop_stops_after_four_rounds() {
    let transport = shared(ScriptedTransport::repeating(|turn| {
        let mut records = function_call(
            &format!("fc_{turn}"),
            &format!("call_{turn}"),
            "get_company_overview",
            json!({"ticker": "AAPL.US"}),
        );
        records.push(completed(vec![]));
        records
    }));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()]));
    let mut history = ConversationHistory::new();

    let outcome = orch
        .send_user_message(&mut history, "loop forever")
        .await
        .unwrap();

    assert_eq!(outcome.status, TurnStatus::LoopLimitReached);
    assert_eq!(transport.call_count(), 5);
    assert_eq!(outcome.tool_rounds, 4);
    assert_eq!(last_assistant_text(&history), LOOP_LIMIT_MESSAGE);
    assert_eq!(
        history.upstream().last(),
        Some(&UpstreamItem::assistant(LOOP_LIMIT_MESSAGE))
    );
    // The fifth turn's call is never executed but still gets a paired output.
    let abandoned = json!({"error": "tool loop limit reached"}).to_string();
    let call = history.display().tool_call("fc_4").unwrap();
    assert_eq!(call.status, ToolCallStatus::Failed);
    assert_eq!(call.output.as_deref(), Some(abandoned.as_str()));
    assert!(history.has_function_call_output("call_4"));
    assert_eq!(transport.requests()[4].input_items.len(), 2);
}

#[tokio::test]
async fn debug_history_after_the_loop_limit_has_no_unpaired_calls() {
    let transport = shared(ScriptedTransport::scripted(
        (0..5)
            .map(|turn| {
                let mut records = function_call(
                    &format!("fc_{turn}"),
                    &format!("call_{turn}"),
                    "get_company_overview",
                    json!({"ticker": "AAPL.US"}),
                );
                records.push(completed(vec![]));
                Script::Records(records)
            })
            .chain(std::iter::once(Script::Records(answer("msg_1", "Done."))))
            .collect(),
    ));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()])).with_debug(true);
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "loop forever").await.unwrap();
    orch.send_user_message(&mut history, "and now?").await.unwrap();

    let replayed = transport.requests()[5]
        .debug
        .as_ref()
        .unwrap()
        .full_history
        .clone();
    for item in replayed.iter().filter(|item| item.is_function_call()) {
        let call_id = item.call_id().unwrap();
        assert!(
            replayed
                .iter()
                .any(|o| o.is_function_call_output() && o.call_id() == Some(call_id)),
            "{call_id} replayed without its output"
        );
    }
}

#[tokio::test]
async fn round_limit_is_configurable() {
    let transport = shared(ScriptedTransport::repeating(|turn| {
        let mut records = function_call(
            &format!("fc_{turn}"),
            &format!("call_{turn}"),
            "get_company_overview",
            json!({"ticker": "MSFT.US"}),
        );
        records.push(completed(vec![]));
        records
    }));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()]))
        .with_max_tool_rounds(1);
    let mut history = ConversationHistory::new();

    let outcome = orch.send_user_message(&mut history, "go").await.unwrap();
    assert_eq!(outcome.status, TurnStatus::LoopLimitReached);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn transport_failure_surfaces_as_message_and_error() {
    let transport = shared(ScriptedTransport::scripted(vec![Script::OpenError(
        EquibotError::api(500, "upstream exploded"),
    )]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![]));
    let mut history = ConversationHistory::new();

    let err = orch
        .send_user_message(&mut history, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, EquibotError::Api { status: 500, .. }));

    let text = last_assistant_text(&history);
    assert!(text.contains("500"), "got {text}");
    assert!(text.contains("upstream exploded"));
    // Only the user message went upstream.
    assert_eq!(history.upstream(), &[UpstreamItem::user("hello")]);
}

#[tokio::test]
async fn broken_stream_keeps_partial_progress() {
    let transport = shared(ScriptedTransport::scripted(vec![Script::BreakAfter(
        vec![message_added("msg_1"), text_delta("msg_1", "Partial answ")],
        EquibotError::Timeout(120_000),
    )]));
    let orch = orchestrator(transport, dispatcher_with(vec![]));
    let mut history = ConversationHistory::new();

    let err = orch.send_user_message(&mut history, "hi").await.unwrap_err();
    assert!(matches!(err, EquibotError::Timeout(_)));

    let texts: Vec<String> = history
        .display()
        .items()
        .iter()
        .filter_map(|item| item.as_message().map(|m| m.text()))
        .collect();
    assert_eq!(texts[0], "hi");
    assert_eq!(texts[1], "Partial answ");
    assert!(texts[2].contains("took too long"));
}

#[tokio::test]
async fn broken_stream_fails_calls_that_never_ran() {
    let mut records = function_call("fc_1", "call_1", "get_company_overview", json!({"ticker": "AAPL.US"}));
    records.push(record(
        "response.output_item.added",
        json!({"item": {"type": "function_call", "id": "fc_2", "name": "get_company_overview", "arguments": ""}}),
    ));
    let transport = shared(ScriptedTransport::scripted(vec![Script::BreakAfter(
        records,
        EquibotError::Stream("connection reset".into()),
    )]));
    let (events, sink) = collecting_sink();
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()])).with_event_sink(sink);
    let mut history = ConversationHistory::new();

    let err = orch.send_user_message(&mut history, "overview?").await.unwrap_err();
    assert!(matches!(err, EquibotError::Stream(_)));
    assert_eq!(transport.call_count(), 1);

    let queued = history.display().tool_call("fc_1").unwrap();
    assert_eq!(queued.status, ToolCallStatus::Failed);
    assert_eq!(
        queued.output.as_deref(),
        Some(json!({"error": "turn stream failed"}).to_string().as_str())
    );
    assert!(history.has_function_call("call_1"));
    assert!(history.has_function_call_output("call_1"));
    assert_eq!(
        history.display().tool_call("fc_2").unwrap().status,
        ToolCallStatus::Failed
    );
    assert!(last_assistant_text(&history).contains("connection to the assistant was lost"));

    let finished = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e.event, TurnEvent::ToolCallFinished { .. }))
        .count();
    assert_eq!(finished, 2);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let mut first = vec![conversation("conv_1")];
    first.extend(function_call("fc_1", "call_1", "get_weather", json!({"city": "Paris"})));
    first.push(completed(vec![]));
    let transport = shared(ScriptedTransport::new(vec![first, answer("msg_1", "Sorry.")]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()]));
    let mut history = ConversationHistory::new();

    let outcome = orch.send_user_message(&mut history, "weather?").await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Completed);

    let expected = json!({"error": "Unknown tool: get_weather"}).to_string();
    assert_eq!(
        transport.requests()[1].input_items,
        vec![UpstreamItem::function_call_output("call_1", expected.clone())]
    );
    let call = history.display().tool_call("fc_1").unwrap();
    assert_eq!(call.status, ToolCallStatus::Failed);
    assert_eq!(call.output.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn failing_tool_marks_the_call_failed() {
    let failing = FunctionTool::new(
        "get_multiples",
        "Multiples",
        ticker_params(),
        |_args| async move { Err(EquibotError::tool("get_multiples", "data provider down")) },
    );
    let mut first = vec![conversation("conv_1")];
    first.extend(function_call("fc_1", "call_1", "get_multiples", json!({"ticker": "NVDA.US"})));
    first.push(completed(vec![]));
    let transport = shared(ScriptedTransport::new(vec![first, answer("msg_1", "No data.")]));
    let (events, sink) = collecting_sink();
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![failing])).with_event_sink(sink);
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "multiples?").await.unwrap();

    assert_eq!(
        history.display().tool_call("fc_1").unwrap().status,
        ToolCallStatus::Failed
    );
    let results: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.event {
            TurnEvent::ToolResult { output, is_error, .. } => Some((output.clone(), *is_error)),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![(json!({"error": "data provider down"}).to_string(), true)]
    );
}

#[tokio::test]
async fn without_conversation_id_calls_are_replayed_with_outputs() {
    let mut first = function_call("fc_1", "call_1", "get_company_overview", json!({"ticker": "AAPL.US"}));
    first.push(completed(vec![]));
    let transport = shared(ScriptedTransport::new(vec![first, answer("msg_1", "Done.")]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![overview_tool()]));
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "overview").await.unwrap();

    let second = transport.request_json(1);
    let items = second["inputItems"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["type"], "function_call");
    assert_eq!(items[0]["call_id"], "call_1");
    assert_eq!(items[0]["name"], "get_company_overview");
    assert_eq!(items[1]["type"], "function_call_output");
    assert_eq!(items[1]["call_id"], "call_1");
    assert!(second.get("conversationId").is_none());
}

#[tokio::test]
async fn parallel_round_keeps_discovery_order() {
    let slow = FunctionTool::new("get_multiples", "Multiples", ticker_params(), |_args| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!({"pe": 30}))
    });
    let mut first = vec![conversation("conv_1")];
    first.extend(function_call("fc_1", "call_1", "get_multiples", json!({"ticker": "AAPL.US"})));
    first.extend(function_call("fc_2", "call_2", "get_company_overview", json!({"ticker": "AAPL.US"})));
    first.push(completed(vec![]));
    let transport = shared(ScriptedTransport::new(vec![first, answer("msg_1", "Both done.")]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![slow, overview_tool()]))
        .with_parallel_tool_calls(true);
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "both").await.unwrap();

    let call_ids: Vec<_> = transport.requests()[1]
        .input_items
        .iter()
        .filter_map(|item| item.call_id().map(str::to_string))
        .collect();
    assert_eq!(call_ids, vec!["call_1", "call_2"]);
}

#[tokio::test]
async fn approval_request_round_trip() {
    let approval = json!({
        "type": "mcp_approval_request",
        "id": "mcpr_1",
        "server_label": "deepwiki",
        "name": "ask_question",
        "arguments": "{\"q\":\"rust\"}"
    });
    let transport = shared(ScriptedTransport::new(vec![
        vec![conversation("conv_1"), completed(vec![approval])],
        answer("msg_1", "Here is the answer."),
    ]));
    let (events, sink) = collecting_sink();
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![])).with_event_sink(sink);
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "ask deepwiki").await.unwrap();
    assert!(matches!(
        history.display().get("mcpr_1"),
        Some(ConversationItem::ApprovalRequest(req)) if req.name == "ask_question"
    ));
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(&e.event, TurnEvent::ApprovalRequested { request } if request.id == "mcpr_1")));

    orch.respond_to_approval(&mut history, "mcpr_1", true)
        .await
        .unwrap();
    let second = transport.request_json(1);
    assert_eq!(
        second["inputItems"],
        json!([{"type": "mcp_approval_response", "approval_request_id": "mcpr_1", "approve": true}])
    );
    assert_eq!(second["conversationId"], "conv_1");

    let err = orch
        .respond_to_approval(&mut history, "", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EquibotError::InvalidArgument(_)));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn duplicate_function_call_events_run_once() {
    let mut first = vec![conversation("conv_1")];
    let call = function_call("fc_1", "call_1", "get_company_overview", json!({"ticker": "AAPL.US"}));
    first.extend(call.clone());
    first.extend(call);
    first.push(completed(vec![]));

    let runs = Arc::new(Mutex::new(0));
    let counter = runs.clone();
    let counting = FunctionTool::new("get_company_overview", "Overview", ticker_params(), move |_args| {
        let counter = counter.clone();
        async move {
            *counter.lock().unwrap() += 1;
            Ok(json!({"ok": true}))
        }
    });
    let transport = shared(ScriptedTransport::new(vec![first, answer("msg_1", "ok")]));
    let orch = orchestrator(transport, dispatcher_with(vec![counting]));
    let mut history = ConversationHistory::new();

    orch.send_user_message(&mut history, "once").await.unwrap();

    assert_eq!(*runs.lock().unwrap(), 1);
    let outputs = history
        .upstream()
        .iter()
        .filter(|item| item.is_function_call_output())
        .count();
    assert_eq!(outputs, 1);
    let calls = history
        .upstream()
        .iter()
        .filter(|item| item.is_function_call())
        .count();
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn events_share_a_run_id_and_are_sequenced() {
    let transport = shared(ScriptedTransport::new(vec![answer("msg_1", "Hi there")]));
    let (events, sink) = collecting_sink();
    let orch = orchestrator(transport, dispatcher_with(vec![])).with_event_sink(sink);
    let mut history = ConversationHistory::new();

    let outcome = orch.send_user_message(&mut history, "hello").await.unwrap();

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.run_id == outcome.run_id));
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted);
    assert!(matches!(events[0].event, TurnEvent::TurnStarted { round: 0, input_items: 1 }));
}

#[tokio::test]
async fn reset_clears_the_conversation() {
    let transport = shared(ScriptedTransport::new(vec![
        vec![conversation("conv_1"), message_added("msg_1"), text_delta("msg_1", "a"), completed(vec![])],
        answer("msg_2", "b"),
    ]));
    let orch = orchestrator(transport.clone(), dispatcher_with(vec![]));
    let mut history = ConversationHistory::with_greeting("Hi, how can I help you?");

    orch.send_user_message(&mut history, "one").await.unwrap();
    assert_eq!(history.conversation_id(), Some("conv_1"));

    history.reset();
    assert_eq!(history.display().len(), 1);
    assert!(history.upstream().is_empty());

    orch.send_user_message(&mut history, "two").await.unwrap();
    assert!(transport.requests()[1].conversation_id.is_none());
}
