//! Task operations.
//!
//! Each operation is a single [`Storage::update_project`] call, so a task
//! change is written, cached and indexed together or not at all.

use chrono::NaiveDate;

use super::Storage;
use super::project::{module_not_found, task_not_found};
use crate::models::{Priority, Recurrence, Task, TaskStatus, TimeEntry};
use crate::{Error, Result};

/// Fields for a new task. Status always starts at todo.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// Defaults to medium
    pub priority: Option<Priority>,
    pub estimated_hours: f64,
    pub tags: Vec<String>,
    pub jira_issue: Option<String>,
    pub parent_id: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Changes to apply to a task. `None` leaves a field as it is; an empty
/// `jira_issue` clears the reference.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub jira_issue: Option<String>,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::ValidationFailed("Task title cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_estimate(hours: f64) -> Result<()> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(Error::ValidationFailed(format!(
            "Estimated hours must be zero or more, got {}",
            hours
        )));
    }
    Ok(())
}

impl Storage {
    /// Create a task at project level or inside `module`.
    pub fn add_task(&self, project: &str, module: Option<&str>, new: NewTask) -> Result<Task> {
        validate_title(&new.title)?;
        validate_estimate(new.estimated_hours)?;
        let now = self.clock.now();

        let task = self.update_project(project, |p| {
            if let Some(module) = module {
                if p.module(module).is_none() {
                    return Err(module_not_found(project, module));
                }
            }

            let id = self.new_task_id(p, &new.title);
            let mut task = Task::new(id, new.title, now);
            task.description = new.description;
            task.priority = new.priority.unwrap_or_default();
            task.estimated_hours = new.estimated_hours;
            task.tags = new.tags;
            task.jira_issue = new.jira_issue.filter(|s| !s.is_empty());
            task.parent_id = new.parent_id.filter(|s| !s.is_empty());

            match module.and_then(|m| p.module_mut(m)) {
                Some(m) => m.tasks.push(task.clone()),
                None => p.tasks.push(task.clone()),
            }
            Ok(task)
        })?;

        tracing::debug!(project, task = %task.id, "created task");
        Ok(task)
    }

    /// Find a task in one project by linear scan. Returns the task and its
    /// location tag.
    pub fn find_task(&self, project: &str, task_id: &str) -> Result<(Task, String)> {
        let p = self.load_project(project)?;
        p.find_task(task_id)
            .map(|(task, location)| (task.clone(), location))
            .ok_or_else(|| task_not_found(project, task_id))
    }

    /// Tasks of a project with their location tags, or of one module.
    pub fn list_tasks(&self, project: &str, module: Option<&str>) -> Result<Vec<(Task, String)>> {
        let p = self.load_project(project)?;
        match module {
            Some(name) => {
                let m = p.module(name).ok_or_else(|| module_not_found(project, name))?;
                let location = crate::models::module_location(name);
                Ok(m.tasks.iter().map(|t| (t.clone(), location.clone())).collect())
            }
            None => Ok(p
                .tasks_with_location()
                .map(|(t, location)| (t.clone(), location))
                .collect()),
        }
    }

    /// Apply `f` to one task and persist. `updated_at` is refreshed.
    pub fn update_task<R, F>(&self, project: &str, task_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Task) -> Result<R>,
    {
        let now = self.clock.now();
        self.update_project(project, |p| {
            let task = p
                .find_task_mut(task_id)
                .ok_or_else(|| task_not_found(project, task_id))?;
            task.updated_at = now;
            f(task)
        })
    }

    pub fn edit_task(&self, project: &str, task_id: &str, edit: TaskEdit) -> Result<Task> {
        if let Some(ref title) = edit.title {
            validate_title(title)?;
        }
        if let Some(hours) = edit.estimated_hours {
            validate_estimate(hours)?;
        }
        self.update_task(project, task_id, |task| {
            if let Some(title) = edit.title {
                task.title = title;
            }
            if let Some(description) = edit.description {
                task.description = description;
            }
            if let Some(priority) = edit.priority {
                task.priority = priority;
            }
            if let Some(hours) = edit.estimated_hours {
                task.estimated_hours = hours;
            }
            if let Some(tags) = edit.tags {
                task.tags = tags;
            }
            if let Some(issue) = edit.jira_issue {
                task.jira_issue = Some(issue).filter(|s| !s.is_empty());
            }
            Ok(task.clone())
        })
    }

    /// Change a task's status. A recurring task moving to done records the
    /// completion and schedules its next occurrence.
    pub fn set_task_status(&self, project: &str, task_id: &str, status: TaskStatus) -> Result<Task> {
        let today = self.clock.today();
        self.update_task(project, task_id, |task| {
            task.set_status(status, today);
            Ok(task.clone())
        })
    }

    pub fn complete_task(&self, project: &str, task_id: &str) -> Result<Task> {
        self.set_task_status(project, task_id, TaskStatus::Done)
    }

    /// Remove a task. References to it from other tasks and sprints are left
    /// in place and show up as orphans.
    pub fn remove_task(&self, project: &str, task_id: &str) -> Result<Task> {
        self.update_project(project, |p| {
            p.remove_task(task_id)
                .ok_or_else(|| task_not_found(project, task_id))
        })
    }

    /// Log hours against a task.
    pub fn add_time_entry(
        &self,
        project: &str,
        task_id: &str,
        date: NaiveDate,
        hours: f64,
    ) -> Result<Task> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(Error::ValidationFailed(format!(
                "Hours must be greater than zero, got {}",
                hours
            )));
        }
        let logged_at = self.clock.now();
        self.update_task(project, task_id, |task| {
            task.time_entries.push(TimeEntry {
                date,
                hours,
                logged_at,
            });
            Ok(task.clone())
        })
    }

    // === Recurrence ===

    /// Make a task recurring. The first occurrence is scheduled after today.
    pub fn set_task_recurrence(&self, project: &str, task_id: &str, pattern: &str) -> Result<Recurrence> {
        let recurrence = Recurrence::parse(pattern, self.clock.today())?;
        self.update_task(project, task_id, |task| {
            task.recurrence = Some(recurrence.clone());
            Ok(recurrence)
        })
    }

    pub fn remove_task_recurrence(&self, project: &str, task_id: &str) -> Result<()> {
        self.update_task(project, task_id, |task| {
            task.recurrence = None;
            Ok(())
        })
    }

    /// Recurring tasks in every project due on or before `day`.
    pub fn recurring_tasks_due(&self, day: NaiveDate) -> Result<Vec<(String, Task)>> {
        let mut due = Vec::new();
        for p in self.all_projects()? {
            for task in p.all_tasks() {
                if task.recurrence.as_ref().is_some_and(|r| r.is_due(day)) {
                    due.push((p.name.clone(), task.clone()));
                }
            }
        }
        Ok(due)
    }

    // === Links ===

    /// Set a task's parent. The parent must exist in the same project.
    pub fn link_task_as_child(&self, project: &str, child_id: &str, parent_id: &str) -> Result<()> {
        self.update_project(project, |p| {
            if !p.contains_task(parent_id) {
                return Err(task_not_found(project, parent_id));
            }
            if child_id == parent_id {
                return Err(Error::InvalidReference(
                    "task cannot be its own parent".to_string(),
                ));
            }
            let child = p
                .find_task_mut(child_id)
                .ok_or_else(|| task_not_found(project, child_id))?;
            child.parent_id = Some(parent_id.to_string());
            Ok(())
        })
    }

    pub fn unlink_task_parent(&self, project: &str, child_id: &str) -> Result<()> {
        self.update_task(project, child_id, |task| {
            task.parent_id = None;
            Ok(())
        })
    }

    /// Record that `task_id` depends on `depends_on`.
    ///
    /// Only self-dependency is rejected; longer cycles are accepted. Adding
    /// an existing dependency is a no-op.
    pub fn add_task_dependency(&self, project: &str, task_id: &str, depends_on: &str) -> Result<()> {
        self.update_project(project, |p| {
            if !p.contains_task(depends_on) {
                return Err(task_not_found(project, depends_on));
            }
            if task_id == depends_on {
                return Err(Error::InvalidReference(
                    "task cannot depend on itself".to_string(),
                ));
            }
            let task = p
                .find_task_mut(task_id)
                .ok_or_else(|| task_not_found(project, task_id))?;
            if !task.dependencies.iter().any(|d| d == depends_on) {
                task.dependencies.push(depends_on.to_string());
            }
            Ok(())
        })
    }

    pub fn remove_task_dependency(&self, project: &str, task_id: &str, depends_on: &str) -> Result<()> {
        self.update_task(project, task_id, |task| {
            let pos = task
                .dependencies
                .iter()
                .position(|d| d == depends_on)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "Dependency {} -> {} not found",
                        task_id, depends_on
                    ))
                })?;
            task.dependencies.remove(pos);
            Ok(())
        })
    }

    // === Queries ===

    pub fn tasks_by_status(&self, project: &str, status: TaskStatus) -> Result<Vec<Task>> {
        let p = self.load_project(project)?;
        Ok(p.all_tasks().filter(|t| t.status == status).cloned().collect())
    }

    pub fn child_tasks(&self, project: &str, parent_id: &str) -> Result<Vec<Task>> {
        let p = self.load_project(project)?;
        Ok(p.all_tasks()
            .filter(|t| t.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    /// Tasks that list `task_id` among their dependencies.
    pub fn dependent_tasks(&self, project: &str, task_id: &str) -> Result<Vec<Task>> {
        let p = self.load_project(project)?;
        Ok(p.all_tasks()
            .filter(|t| t.dependencies.iter().any(|d| d == task_id))
            .cloned()
            .collect())
    }
}
