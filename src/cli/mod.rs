//! CLI module for the Foodie server
//!
//! Provides command-line interface parsing and handling for the foodie-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use crate::AppVariant;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Foodie customer-service chat server
///
/// Retrieval-grounded chat over the documents in the data directory,
/// answered by a local Ollama model and streamed as server-sent events.
#[derive(Parser, Debug)]
#[command(
    name = "foodie-server",
    version,
    about = "Foodie - customer-service chat server",
    long_about = "Session-scoped RAG chat over a local Ollama instance with SSE streaming.\n\n\
                  Run without arguments to start the server, or use 'index' to build the\n\
                  document index ahead of time.",
    after_help = "EXAMPLES:\n    \
                  foodie-server                          # Serve the main app (reads foodie.toml)\n    \
                  foodie-server serve --app chat-app     # Serve the intent-routed chat app\n    \
                  foodie-server serve --reload           # Re-index and reload config on change\n    \
                  foodie-server index --force            # Rebuild the document index\n    \
                  foodie-server ask                      # Ask questions in the terminal"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "foodie.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Build the document index, or refresh it when documents changed
    Index {
        /// Rebuild even when nothing changed
        #[arg(short, long)]
        force: bool,
    },

    /// Interactive question answering in the terminal
    Ask,

    /// Report document changes since the last index build
    Monitor,

    /// Print the effective configuration
    Config,
}

/// Options of `serve`
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Application to serve
    #[arg(long, value_enum, default_value_t = AppVariant::Main)]
    pub app: AppVariant,

    /// Bind address (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Watch the data directory and the config file for changes
    #[arg(long)]
    pub reload: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run; `serve` with defaults when none was given.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    }
}
