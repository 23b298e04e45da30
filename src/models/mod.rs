//! Data models for qix entities.
//!
//! This module defines the core data structures:
//! - `Project` - The unit of persistence, one JSON document per project
//! - `Module` - Named grouping of tasks inside a project
//! - `Task` - Work items with status, priority, time entries and recurrence
//! - `Sprint` - Time-boxed set of task references
//! - `TrackingData` - The active time-tracking session and its history
//! - `TaskLocation` - Entry of the cross-project task index

pub mod recurrence;

pub use recurrence::{Recurrence, RecurrenceKind};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Location tag for tasks stored in a project's top-level list.
pub const PROJECT_LOCATION: &str = "project";

/// Prefix of the location tag for tasks stored in a module.
pub const MODULE_LOCATION_PREFIX: &str = "module:";

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Blocked,
}

impl TaskStatus {
    /// All statuses, in workflow order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::Doing,
        TaskStatus::Done,
        TaskStatus::Blocked,
    ];

    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "todo" => Some(TaskStatus::Todo),
            "doing" | "in-progress" | "in_progress" => Some(TaskStatus::Doing),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "med" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A project: the unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique name, doubles as the file stem
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub modules: Vec<Module>,

    /// Project-level tasks (not in any module)
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub sprints: Vec<Sprint>,

    pub created_at: DateTime<Utc>,
}

/// A named sub-grouping of tasks within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Unique within its project
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    pub created_at: DateTime<Utc>,
}

/// A work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique identifier (8 lowercase hex characters)
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    /// Non-negative estimate in hours
    #[serde(default)]
    pub estimated_hours: f64,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Task IDs this task depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// External issue reference (e.g. "PROJ-123")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_issue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with default status and priority.
    pub fn new(id: String, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            estimated_hours: 0.0,
            tags: Vec::new(),
            dependencies: Vec::new(),
            jira_issue: None,
            parent_id: None,
            time_entries: Vec::new(),
            recurrence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total hours logged, always recomputed from the time entries.
    pub fn actual_hours(&self) -> f64 {
        self.time_entries.iter().map(|e| e.hours).fold(0.0, |acc, h| acc + h)
    }

    /// Whether logged time exceeds a non-zero estimate.
    pub fn is_over_budget(&self) -> bool {
        self.estimated_hours > 0.0 && self.actual_hours() > self.estimated_hours
    }

    /// Actual minus estimated hours.
    pub fn variance(&self) -> f64 {
        self.actual_hours() - self.estimated_hours
    }

    /// Variance relative to the estimate, in percent. Zero without an estimate.
    pub fn variance_percentage(&self) -> f64 {
        if self.estimated_hours == 0.0 {
            return 0.0;
        }
        self.variance() / self.estimated_hours * 100.0
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.as_ref().is_some_and(|r| r.enabled)
    }

    /// Set the status, advancing the recurrence schedule when a recurring
    /// task transitions to done.
    pub fn set_status(&mut self, status: TaskStatus, today: NaiveDate) {
        let completing = status == TaskStatus::Done && self.status != TaskStatus::Done;
        self.status = status;
        if completing && self.is_recurring() {
            if let Some(recurrence) = self.recurrence.as_mut() {
                recurrence.complete(today);
            }
        }
    }
}

/// A single logged-hours record against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Calendar day the work happened
    pub date: NaiveDate,

    /// Positive number of hours
    pub hours: f64,

    /// When the entry was recorded
    pub logged_at: DateTime<Utc>,
}

/// A time-boxed collection of task references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Referenced task IDs (no ownership)
    #[serde(default)]
    pub task_ids: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Sprint {
    /// Whether the given day falls inside the sprint.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day <= self.end_date
    }
}

/// Where a task is stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskLocation {
    pub project: String,

    /// "project" or "module:<name>"
    pub location: String,
}

impl TaskLocation {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
        }
    }

    /// Module name when the task lives inside a module.
    pub fn module_name(&self) -> Option<&str> {
        self.location.strip_prefix(MODULE_LOCATION_PREFIX)
    }
}

/// Task ID to location. Ordered so snapshots serialize deterministically.
pub type TaskIndexMap = BTreeMap<String, TaskLocation>;

/// Build the location tag for a module.
pub fn module_location(module: &str) -> String {
    format!("{}{}", MODULE_LOCATION_PREFIX, module)
}

/// An in-progress tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    /// "project" or "project/module"
    pub path: String,
    pub task_id: String,
    #[serde(rename = "start")]
    pub start_time: DateTime<Utc>,
}

impl TrackingSession {
    /// Project name part of the session path.
    pub fn project(&self) -> &str {
        split_path(&self.path).0
    }
}

/// A finished tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub path: String,
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: f64,
}

/// Contents of tracking.json.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub active_session: Option<TrackingSession>,

    #[serde(default)]
    pub sessions: Vec<CompletedSession>,
}

/// Split "project/module" into its parts.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((project, module)) if !module.is_empty() => (project, Some(module)),
        Some((project, _)) => (project, None),
        None => (path, None),
    }
}

/// Summary numbers for a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub total_tasks: usize,
    pub todo: usize,
    pub doing: usize,
    pub done: usize,
    pub blocked: usize,
    pub total_estimated: f64,
    pub total_actual: f64,
    pub completion_pct: f64,
    pub module_count: usize,
    pub sprint_count: usize,
}

impl Project {
    /// Create an empty project.
    pub fn new(name: String, description: String, tags: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            name,
            description,
            tags,
            modules: Vec::new(),
            tasks: Vec::new(),
            sprints: Vec::new(),
            created_at: now,
        }
    }

    /// Every task together with its location tag, project-level first.
    pub fn tasks_with_location(&self) -> impl Iterator<Item = (&Task, String)> {
        self.tasks
            .iter()
            .map(|t| (t, PROJECT_LOCATION.to_string()))
            .chain(self.modules.iter().flat_map(|m| {
                let location = module_location(&m.name);
                m.tasks.iter().map(move |t| (t, location.clone()))
            }))
    }

    /// Every task, project-level first, then module by module.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .chain(self.modules.iter().flat_map(|m| m.tasks.iter()))
    }

    /// Linear scan for a task and its location tag.
    pub fn find_task(&self, id: &str) -> Option<(&Task, String)> {
        self.tasks_with_location().find(|(t, _)| t.id == id)
    }

    pub fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            return Some(task);
        }
        self.modules
            .iter_mut()
            .flat_map(|m| m.tasks.iter_mut())
            .find(|t| t.id == id)
    }

    pub fn contains_task(&self, id: &str) -> bool {
        self.all_tasks().any(|t| t.id == id)
    }

    /// Remove a task from whichever container holds it.
    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        if let Some(pos) = self.tasks.iter().position(|t| t.id == id) {
            return Some(self.tasks.remove(pos));
        }
        for module in &mut self.modules {
            if let Some(pos) = module.tasks.iter().position(|t| t.id == id) {
                return Some(module.tasks.remove(pos));
            }
        }
        None
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.name == name)
    }

    pub fn sprint(&self, name: &str) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.name == name)
    }

    pub fn sprint_mut(&mut self, name: &str) -> Option<&mut Sprint> {
        self.sprints.iter_mut().find(|s| s.name == name)
    }

    /// Task counts per status. Every status is present, even at zero.
    pub fn count_by_status(&self) -> BTreeMap<TaskStatus, usize> {
        let mut counts: BTreeMap<TaskStatus, usize> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for task in self.all_tasks() {
            *counts.entry(task.status).or_default() += 1;
        }
        counts
    }

    pub fn total_estimated(&self) -> f64 {
        self.all_tasks().map(|t| t.estimated_hours).fold(0.0, |acc, h| acc + h)
    }

    pub fn total_actual(&self) -> f64 {
        self.all_tasks().map(Task::actual_hours).fold(0.0, |acc, h| acc + h)
    }

    /// Share of tasks that are done, in percent.
    pub fn completion_percentage(&self) -> f64 {
        let total = self.all_tasks().count();
        if total == 0 {
            return 0.0;
        }
        let done = self
            .all_tasks()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        done as f64 / total as f64 * 100.0
    }

    pub fn stats(&self) -> ProjectStats {
        let counts = self.count_by_status();
        let count = |s: TaskStatus| counts.get(&s).copied().unwrap_or(0);
        ProjectStats {
            total_tasks: self.all_tasks().count(),
            todo: count(TaskStatus::Todo),
            doing: count(TaskStatus::Doing),
            done: count(TaskStatus::Done),
            blocked: count(TaskStatus::Blocked),
            total_estimated: self.total_estimated(),
            total_actual: self.total_actual(),
            completion_pct: self.completion_percentage(),
            module_count: self.modules.len(),
            sprint_count: self.sprints.len(),
        }
    }
}
