//! CLI argument definitions for Orgi.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("ORGI_GIT_COMMIT"),
    ", built ",
    env!("ORGI_BUILD_TIMESTAMP"),
    ")"
);

/// Orgi - keep an org-mode issue log in sync with TODO comments in your source.
///
/// Run `orgi gather` to turn TODO comments into issues, mark issues DONE with
/// `orgi state`, then `orgi sync` to remove the finished TODOs from source.
#[derive(Parser, Debug)]
#[command(name = "orgi")]
#[command(author, version, long_version = LONG_VERSION, about = "Keep an org-mode issue log in sync with TODO comments", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Path of the org document (overrides ORGI_FILE and config files)
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,

    /// Log debug output to stderr (ORGI_LOG takes precedence)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the org document and a project .orgi.kdl if missing
    Init,

    /// Add an issue to the org document
    Add {
        /// Issue title
        title: String,

        /// Priority (A, B or C)
        #[arg(short, long)]
        priority: Option<String>,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Description written as the entry body
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List issues
    List {
        /// Only issues in this state (todo, inprogress, done, kill)
        #[arg(long)]
        state: Option<String>,

        /// Only issues carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show one issue by ID
    Show {
        /// Issue ID (e.g., orgi-a1b2, gather-20240115103000-1a2b3c4d)
        id: String,
    },

    /// Change the state of an issue
    State {
        /// Issue ID
        id: String,

        /// New state (todo, inprogress, done, kill)
        state: String,
    },

    /// Create issues from TODO comments and mark them in source
    Gather {
        /// Directory to scan (not recursive)
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Report what would be gathered without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove the source lines of DONE issues
    Sync {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Comment the line out instead of removing it
        #[arg(long)]
        comment_out: bool,
    },

    /// Report TODOs without issues and issues whose TODO is gone
    Validate {
        /// Directory to scan (not recursive)
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Do not expect TODOs for DONE or KILL issues
        #[arg(long)]
        ignore_closed: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration values and where they come from
    Show,
}
