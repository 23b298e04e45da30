//! qix - A local project and time tracking library.
//!
//! This library provides the core functionality for the `qix` CLI tool:
//! project documents stored as JSON files, an in-memory project cache, a
//! cross-project task index, and the mutation API every command goes through.

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod storage;

use std::path::PathBuf;


/// Library-level error type for qix operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {}", .0.display())]
    MissingDocument(PathBuf),

    #[error("Corrupted document {}: {source}", path.display())]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Module not found: {project}/{module}")]
    ModuleNotFound { project: String, module: String },

    #[error("Task '{task_id}' not found in project '{project}'")]
    TaskNotFound { project: String, task_id: String },

    #[error("Sprint '{sprint}' not found in project '{project}'")]
    SprintNotFound { project: String, sprint: String },

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("{kind} '{name}' already exists")]
    Conflict { kind: &'static str, name: String },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to save {} project(s): {}", failures.len(), describe_failures(failures))]
    FlushFailed { failures: Vec<(String, String)> },

    #[error("Active session already exists for task {0}")]
    SessionActive(String),

    #[error("No active tracking session")]
    NoActiveSession,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the addressed entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::MissingDocument(_)
                | Error::ProjectNotFound(_)
                | Error::ModuleNotFound { .. }
                | Error::TaskNotFound { .. }
                | Error::SprintNotFound { .. }
                | Error::NotFound(_)
        )
    }
}

fn describe_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(project, err)| format!("{} ({})", project, err))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for qix operations.
pub type Result<T> = std::result::Result<T, Error>;
