//! Command-line interface for tasksync
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;

mod init;
mod mirror;
mod serve;
mod task;

/// tasksync - markdown-backed task graph synchronization
///
/// Keeps a structured task store and one markdown document per task in
/// sync, broadcasts change events, and can mirror the document tree
/// into a second location.
#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the workspace (defaults to current directory)
    #[arg(long, global = true, env = "TASKSYNC_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a workspace (document tree, task store, config)
    Init,

    /// Task operations
    #[command(subcommand)]
    Task(TaskCommands),

    /// Run the engine: document watcher plus event bus relay
    Serve {
        /// Address for the bus relay (overrides config)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Run the mirror worker against a serve instance
    Mirror {
        /// Bus relay address to connect to (overrides config)
        #[arg(long)]
        addr: Option<String>,

        /// Mirror tree root (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task and its document
    New {
        /// Task title
        title: String,

        /// Explicit task id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Task kind: main or branch
        #[arg(long)]
        kind: Option<String>,

        /// Parent task id
        #[arg(long)]
        parent: Option<String>,

        /// Status: not-started, in-progress, completed, blocked
        #[arg(long)]
        status: Option<String>,

        /// Priority: low, medium, high
        #[arg(long)]
        priority: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Assignee name
        #[arg(long)]
        assignee: Option<String>,

        /// Canvas position as "x,y"
        #[arg(long)]
        position: Option<String>,
    },

    /// List tasks, most recently updated first
    List,

    /// Show one task with its live document content
    Show {
        /// Task id
        id: String,
    },

    /// Update task fields
    Set {
        /// Task id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New kind: main or branch
        #[arg(long)]
        kind: Option<String>,

        /// New parent task id
        #[arg(long, conflicts_with = "clear_parent")]
        parent: Option<String>,

        /// Detach from the current parent
        #[arg(long)]
        clear_parent: bool,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New priority
        #[arg(long)]
        priority: Option<String>,

        /// New due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// New assignee
        #[arg(long)]
        assignee: Option<String>,

        /// New canvas position as "x,y"
        #[arg(long)]
        position: Option<String>,
    },

    /// Replace a task's document text verbatim
    Content {
        /// Task id
        id: String,

        /// Read the text from a file instead of stdin
        #[arg(short = 'F', long)]
        file: Option<PathBuf>,
    },

    /// Delete a task, its document, and all descendants
    Rm {
        /// Task id
        id: String,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let workspace = self
            .workspace
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(init::InitOptions { workspace, output }),
            Commands::Task(command) => task::run(command, workspace, output),
            Commands::Serve { addr } => serve::run(serve::ServeOptions {
                addr,
                workspace,
                output,
            }),
            Commands::Mirror { addr, dir } => mirror::run(mirror::MirrorOptions {
                addr,
                dir,
                workspace,
                output,
            }),
        }
    }
}
