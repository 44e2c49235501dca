//! Command-line interface for slate
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the `init` and `task` submodules.

use clap::{Parser, Subcommand};

use crate::error::Result;

mod init;
mod task;

/// slate - slug-addressed task ledger
///
/// Tracks tasks in a local ledger and addresses every task by a unique,
/// URL-safe slug derived from its title.
#[derive(Parser, Debug)]
#[command(name = "slate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the ledger root (defaults to current directory)
    #[arg(long, global = true, env = "SLATE_REPO")]
    pub repo: Option<std::path::PathBuf>,

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
    /// Initialize a slate ledger in a directory
    Init,

    /// Create a task; its slug is derived from the title
    Add {
        /// Task title
        title: String,

        /// Initial status (defaults to the configured default)
        #[arg(long)]
        status: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Count tasks
    Count {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task
    Show {
        /// Task slug
        slug: String,
    },

    /// Change a task's title (re-slugs when the normalized base changes)
    Retitle {
        /// Task slug
        slug: String,

        /// New title
        title: String,
    },

    /// Change a task's status
    Status {
        /// Task slug
        slug: String,

        /// New status
        status: String,
    },

    /// Close a task with the configured done status
    Done {
        /// Task slug
        slug: String,
    },

    /// Delete a task, freeing its slug
    Rm {
        /// Task slug
        slug: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => init::run(self.repo, self.json, self.quiet),
            Commands::Add { title, status } => task::run_add(task::AddOptions {
                title,
                status,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::List { status } => task::run_list(task::ListOptions {
                status,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Count { status } => task::run_count(task::CountOptions {
                status,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Show { slug } => task::run_show(task::ShowOptions {
                slug,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Retitle { slug, title } => task::run_retitle(task::RetitleOptions {
                slug,
                title,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Status { slug, status } => task::run_status(task::StatusOptions {
                slug,
                status,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Done { slug } => task::run_done(task::DoneOptions {
                slug,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Rm { slug } => task::run_rm(task::RmOptions {
                slug,
                repo: self.repo,
                json: self.json,
                quiet: self.quiet,
            }),
        }
    }
}
