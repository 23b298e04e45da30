//! Command implementations for the qix CLI.
//!
//! Each command calls into [`Storage`](crate::storage::Storage) and returns
//! a result value that renders as JSON or as human-readable text.
//! Commands are organized by entity type:
//! - `project` - Project CRUD, rename and statistics
//! - `module` - Modules inside a project
//! - `task` - Tasks, links, dependencies, recurrence and time entries
//! - `sprint` - Sprints and their task references
//! - `track` - Time tracking sessions
//! - `system` - Index, cache and consistency maintenance

mod module;
mod project;
mod sprint;
mod system;
mod task;
mod track;

pub use module::*;
pub use project::*;
pub use sprint::*;
pub use system::*;
pub use task::*;
pub use track::*;

use chrono::NaiveDate;
use serde::Serialize;

use crate::storage::{Storage, parse_date};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Split a `<project>/<module>` path, requiring the module part.
fn module_path(path: &str) -> Result<(&str, &str)> {
    match crate::models::split_path(path) {
        (project, Some(module)) => Ok((project, module)),
        (_, None) => Err(Error::ValidationFailed(format!(
            "Expected <project>/<module>, got {:?}",
            path
        ))),
    }
}

/// The project holding a task: the one given, or the one the index reports.
fn owning_project(storage: &Storage, project: Option<&str>, task_id: &str) -> Result<String> {
    match project {
        Some(p) => Ok(p.to_string()),
        None => storage.locate_task(task_id).map(|(_, loc)| loc.project),
    }
}

fn date_or_today(storage: &Storage, date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(d) => parse_date(d),
        None => Ok(storage.clock().today()),
    }
}

/// Render a date with a user pattern, falling back to ISO form when the
/// pattern does not apply to plain dates.
fn format_date(date: NaiveDate, pattern: &str) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    if write!(out, "{}", date.format(pattern)).is_err() {
        return date.to_string();
    }
    out
}

fn format_hours(hours: f64) -> String {
    format!("{:.2}h", hours)
}

fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", tags.join(", "))
    }
}
