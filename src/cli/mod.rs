use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "linkpeek")]
#[command(about = "LinkPeek Traffic Firewall - redirect-risk decisions for in-app browser traffic")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "linkpeek.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the firewall service
    Start,
    /// Initialize LinkPeek configuration and database
    Init {
        /// Config template to apply (default or strict)
        #[arg(long, default_value = "default")]
        template: String,
    },
    /// Show firewall statistics
    Status,
    /// View redirect events
    Events {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export events
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Per-user firewall toggle management
    Firewall {
        #[command(subcommand)]
        action: FirewallAction,
    },
    /// Channel benchmark management
    Benchmarks {
        #[command(subcommand)]
        action: BenchmarkAction,
    },
}

#[derive(Subcommand)]
pub enum FirewallAction {
    /// Enable the firewall for a user
    Enable {
        /// User ID
        user: String,
    },
    /// Disable the firewall for a user
    Disable {
        /// User ID
        user: String,
    },
    /// Show a user's firewall settings
    Show {
        /// User ID
        user: String,
    },
}

#[derive(Subcommand)]
pub enum BenchmarkAction {
    /// Recompute per-platform benchmarks now
    Recompute,
    /// Show current benchmark rows
    Show,
}
