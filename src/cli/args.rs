//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::SyncOptions;

/// Weft theme development CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: weft.toml)
    #[arg(short = 'C', long, global = true, default_value = "weft.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the live preview server with hot reload
    #[command(visible_alias = "d")]
    Dev {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Upload local changes to the remote theme
    Push {
        #[command(flatten)]
        sync_args: SyncArgs,
    },

    /// Download the remote theme into the local directory
    Pull {
        #[command(flatten)]
        sync_args: SyncArgs,
    },

    /// Promote the theme to the live role
    Publish {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Shared flags for the push and pull commands
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct SyncArgs {
    /// Skip all confirmation prompts
    #[arg(short, long)]
    pub force: bool,

    /// Never delete files on the receiving side
    #[arg(long)]
    pub no_delete: bool,
}

impl From<SyncArgs> for SyncOptions {
    fn from(args: SyncArgs) -> Self {
        Self {
            force: args.force,
            no_delete: args.no_delete,
        }
    }
}
