//! Equibot CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use equibot::cli::{ChatArgs, Cli, Commands, ReplCommand};
use equibot::config::AssistantConfig;
use equibot::history::ConversationHistory;
use equibot::tools::{function_catalog, http_function_registry, ToolDispatcher};
use equibot::transport::HttpTurnTransport;
use equibot::turn::{TurnEvent, TurnEventEnvelope, TurnOrchestrator, TurnOutcome, TurnStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::Chat(args) => handle_chat(&cli, args).await,
        Commands::Tools => {
            handle_tools();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_tools() {
    for (name, description, parameters) in function_catalog() {
        println!("{name}({})", parameters.required().join(", "));
        println!("    {description}");
    }
}

async fn handle_chat(cli: &Cli, args: &ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AssistantConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.turn_endpoint = endpoint.clone();
    }
    config.debug |= cli.debug;
    config.parallel_tool_calls |= args.parallel_tools;
    config.validate()?;

    let transport = Arc::new(HttpTurnTransport::new(&config)?);
    let dispatcher = ToolDispatcher::new(http_function_registry(&config)?, config.tool_timeout);
    let orchestrator = TurnOrchestrator::from_config(&config, transport, dispatcher)
        .with_event_sink(Arc::new(render_event));

    let mut history = match &config.greeting {
        Some(greeting) => ConversationHistory::with_greeting(greeting.clone()),
        None => ConversationHistory::new(),
    };

    if let Some(prompt) = &args.prompt {
        let outcome = orchestrator.send_user_message(&mut history, prompt).await?;
        finish_turn(&outcome);
        return Ok(());
    }

    if let Some(greeting) = &config.greeting {
        println!("{greeting}");
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Invalid(hint) => {
                eprintln!("{hint}");
                continue;
            }
            ReplCommand::New => {
                history.reset();
                if let Some(greeting) = &config.greeting {
                    println!("{greeting}");
                }
                continue;
            }
            ReplCommand::Approval { id, approve } => {
                orchestrator
                    .respond_to_approval(&mut history, &id, approve)
                    .await
            }
            ReplCommand::Message(text) => orchestrator.send_user_message(&mut history, &text).await,
        };

        // The failure is already in the transcript; keep the session alive.
        match result {
            Ok(outcome) => finish_turn(&outcome),
            Err(e) => eprintln!("\n❌ {e}"),
        }
    }

    Ok(())
}

fn finish_turn(outcome: &TurnOutcome) {
    println!(); // newline after streaming
    if outcome.status == TurnStatus::LoopLimitReached {
        println!("{}", equibot::turn::LOOP_LIMIT_MESSAGE);
    }
}

fn render_event(envelope: TurnEventEnvelope) {
    match &envelope.event {
        TurnEvent::TextDelta { delta, .. } => {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::ToolCallStarted { item_id, kind, name } => {
            let label = name.clone().unwrap_or_else(|| kind.to_string());
            eprintln!("\n⚡ {label} ({item_id})");
        }
        TurnEvent::ToolResult { output, is_error, .. } => {
            let truncated = truncate(output, 200);
            if *is_error {
                eprintln!("  ❌ {truncated}");
            } else {
                eprintln!("  ✅ {truncated}");
            }
        }
        TurnEvent::ApprovalRequested { request } => {
            eprintln!(
                "\n🔐 {} on {} needs approval: /approve {} or /deny {}",
                request.name, request.server_label, request.id, request.id
            );
        }
        TurnEvent::TurnFailed { message } => {
            eprintln!("\n❌ {message}");
        }
        _ => {}
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
