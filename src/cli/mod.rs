//! CLI entry point for equibot.

pub mod repl;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use repl::ReplCommand;

/// Equibot financial assistant CLI
#[derive(Parser, Debug)]
#[command(name = "equibot", version, about = "Equibot: streaming financial assistant")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the streaming turn endpoint
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Verbose logging and debug history in turn requests
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the assistant
    Chat(ChatArgs),
    /// List the built-in function tools
    Tools,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Run tool calls of one round concurrently
    #[arg(long)]
    pub parallel_tools: bool,

    /// One-shot prompt; starts an interactive session when omitted
    pub prompt: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default `tracing` filter directive for this invocation.
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "equibot=debug"
        } else {
            "equibot=info"
        }
    }
}
