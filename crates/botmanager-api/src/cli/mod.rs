//! CLI command definitions for the `botmgr` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a verb-noun
//! pattern (e.g., `botmgr key issue`).

pub mod key;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use botmanager_types::identity::Scope;

/// Serve and administer the bot manager.
#[derive(Parser)]
#[command(name = "botmgr", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug logs).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage API keys.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Issue a new API key for an owner. The key is printed once.
    Issue {
        /// Owner identifier the key acts as.
        #[arg(long)]
        owner: String,

        /// Granted scope; repeat for several.
        #[arg(long = "scope", default_values_t = [Scope::Read, Scope::Write])]
        scopes: Vec<Scope>,

        /// Label stored with the key.
        #[arg(long, default_value = "default")]
        name: String,
    },
}
