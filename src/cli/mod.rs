//! CLI argument definitions for qix.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qix - Track projects, modules, tasks, sprints and time from the terminal.
///
/// Paths name a project (`web`) or a module inside it (`web/frontend`).
#[derive(Parser, Debug)]
#[command(name = "qix")]
#[command(author, version, about = "A local CLI tracker for projects, tasks and time", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Data directory (default: ~/.qix)
    #[arg(long = "dir", global = true, env = "QIX_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level for this invocation (debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Module management commands
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Sprint management commands
    Sprint {
        #[command(subcommand)]
        command: SprintCommands,
    },

    /// Time tracking commands
    Track {
        #[command(subcommand)]
        command: TrackCommands,
    },

    /// Index, cache and consistency maintenance
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project
    Create {
        /// Project name
        name: String,

        /// Project description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tags for the project
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// List all projects
    List,

    /// Show a project with its modules, tasks and sprints
    Show {
        /// Project name
        name: String,
    },

    /// Delete a project and everything in it
    Delete {
        /// Project name
        name: String,
    },

    /// Rename a project
    Rename {
        /// Current name
        old: String,

        /// New name
        new: String,
    },

    /// Show task counts and hour totals
    Stats {
        /// Project name
        name: String,
    },
}

/// Module subcommands
#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    /// Create a module
    Create {
        /// Module path (project/module)
        path: String,

        /// Module description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tags for the module
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// List modules of a project
    List {
        /// Project name
        project: String,
    },

    /// Show a module
    Show {
        /// Module path (project/module)
        path: String,
    },

    /// Edit a module
    Edit {
        /// Module path (project/module)
        path: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Replace tags (repeatable)
        #[arg(long)]
        tag: Option<Vec<String>>,
    },

    /// Remove a module and its tasks
    Remove {
        /// Module path (project/module)
        path: String,
    },
}

/// Task subcommands
///
/// Commands taking a task ID accept `--project`; without it the task is
/// located through the index.
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Create {
        /// Where the task lives (project or project/module)
        path: String,

        /// Task title
        title: String,

        /// Task description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,

        /// Estimated hours
        #[arg(short, long)]
        estimate: Option<f64>,

        /// Tags for the task
        #[arg(short, long)]
        tag: Vec<String>,

        /// Jira issue key
        #[arg(long)]
        jira: Option<String>,

        /// Parent task ID
        #[arg(long)]
        parent: Option<String>,
    },

    /// List tasks of a project or module
    List {
        /// Project or project/module
        path: String,

        /// Filter by status (todo, doing, done, blocked)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Change task status (todo, doing, done, blocked)
    Update {
        /// Task ID
        id: String,

        /// New status
        status: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Edit task fields
    Edit {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New priority (low, medium, high)
        #[arg(long)]
        priority: Option<String>,

        /// New estimate in hours
        #[arg(long)]
        estimate: Option<f64>,

        /// Replace tags (repeatable)
        #[arg(long)]
        tag: Option<Vec<String>>,

        /// Jira issue key (empty string clears it)
        #[arg(long)]
        jira: Option<String>,
    },

    /// Remove a task
    Remove {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Make a task the child of another task
    Link {
        /// Child task ID
        child: String,

        /// Parent task ID
        parent: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Clear a task's parent
    Unlink {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Record that a task depends on another
    Depend {
        /// Dependent task ID
        id: String,

        /// Task it depends on
        on: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Remove a dependency
    Undepend {
        /// Dependent task ID
        id: String,

        /// Task it no longer depends on
        on: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Make a task recurring (daily, weekly:<day>, monthly:<1-31>, interval:<days>)
    Recur {
        /// Task ID
        id: String,

        /// Recurrence pattern
        pattern: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Stop a task from recurring
    Unrecur {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// List recurring tasks due on a date
    Due {
        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a task done
    Complete {
        /// Task ID
        id: String,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Log hours against a task
    Time {
        /// Task ID
        id: String,

        /// Hours worked
        hours: f64,

        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Find which project and module hold a task
    Locate {
        /// Task ID
        id: String,
    },
}

/// Sprint subcommands
#[derive(Subcommand, Debug)]
pub enum SprintCommands {
    /// Create a sprint
    Create {
        /// Project name
        project: String,

        /// Sprint name
        name: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: String,
    },

    /// List sprints of a project
    List {
        /// Project name
        project: String,
    },

    /// Show a sprint and its tasks
    Show {
        /// Project name
        project: String,

        /// Sprint name
        name: String,
    },

    /// Add a task to a sprint
    Assign {
        /// Project name
        project: String,

        /// Sprint name
        sprint: String,

        /// Task ID
        task: String,
    },

    /// Take a task out of a sprint
    Unassign {
        /// Project name
        project: String,

        /// Sprint name
        sprint: String,

        /// Task ID
        task: String,
    },

    /// Remove a sprint
    Remove {
        /// Project name
        project: String,

        /// Sprint name
        name: String,
    },
}

/// Time tracking subcommands
#[derive(Subcommand, Debug)]
pub enum TrackCommands {
    /// Start tracking time on a task
    Start {
        /// Project or project/module
        path: String,

        /// Task ID
        task: String,

        /// Stop the active session first instead of failing
        #[arg(long)]
        switch: bool,
    },

    /// Stop the active session and log its hours
    Stop {
        /// Drop the session without logging time
        #[arg(long)]
        discard: bool,
    },

    /// Show the active session
    Status,

    /// Show time entries for a date across all projects
    Log {
        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Stop the active session and start another
    Switch {
        /// Project or project/module
        path: String,

        /// Task ID
        task: String,
    },

    /// List completed sessions
    List,
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Check index freshness, index consistency and orphaned references
    Health,

    /// Rebuild the task index from every project
    Reindex,

    /// Drop index entries of deleted projects
    Compact,

    /// Write every unsaved project to disk
    Flush,

    /// Show cache and index statistics
    Stats,
}
