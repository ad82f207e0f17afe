//! Equibot: turn-processing engine for a streaming, tool-calling financial
//! assistant.
//!
//! A user turn is streamed from a Responses-style endpoint as server-sent
//! events. The engine folds those events into a [`history::ConversationHistory`],
//! runs any function calls the model asks for, and feeds the outputs back
//! until the model answers or the tool-round limit is hit.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use equibot::prelude::*;
//!
//! # async fn example() -> equibot::error::Result<()> {
//! let config = AssistantConfig::load(None)?;
//! let transport = Arc::new(HttpTurnTransport::new(&config)?);
//! let dispatcher = ToolDispatcher::new(http_function_registry(&config)?, config.tool_timeout);
//! let orchestrator = TurnOrchestrator::from_config(&config, transport, dispatcher);
//!
//! let mut history = ConversationHistory::with_greeting("Hi, how can I help you?");
//! let outcome = orchestrator
//!     .send_user_message(&mut history, "What is AAPL's overview?")
//!     .await?;
//! println!("{} after {} tool rounds", outcome.status, outcome.tool_rounds);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod prelude;
pub mod tools;
pub mod transport;
pub mod turn;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
