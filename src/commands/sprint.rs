use chrono::NaiveDate;
use serde::Serialize;

use super::{CommandResult, json};
use crate::Result;
use crate::models::{Sprint, Task};
use crate::storage::{Storage, parse_date};

#[derive(Serialize)]
pub struct SprintResult {
    pub project: String,
    pub action: &'static str,
    pub sprint: Sprint,
}

impl CommandResult for SprintResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let verb = match self.action {
            "created" => "Created",
            _ => "Removed",
        };
        format!(
            "{} sprint '{}' in '{}' ({}..{})",
            verb, self.sprint.name, self.project, self.sprint.start_date, self.sprint.end_date
        )
    }
}

pub fn sprint_create(
    storage: &Storage,
    project: &str,
    name: &str,
    start: &str,
    end: &str,
) -> Result<SprintResult> {
    let sprint = storage.add_sprint(project, name, parse_date(start)?, parse_date(end)?)?;
    Ok(SprintResult {
        project: project.to_string(),
        action: "created",
        sprint,
    })
}

pub fn sprint_remove(storage: &Storage, project: &str, name: &str) -> Result<SprintResult> {
    let sprint = storage.remove_sprint(project, name)?;
    Ok(SprintResult {
        project: project.to_string(),
        action: "removed",
        sprint,
    })
}

#[derive(Serialize)]
pub struct SprintSummary {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub tasks: usize,
    pub active: bool,
}

#[derive(Serialize)]
pub struct SprintList {
    pub project: String,
    pub sprints: Vec<SprintSummary>,
    pub count: usize,
}

impl CommandResult for SprintList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.sprints.is_empty() {
            return format!("No sprints in '{}'.", self.project);
        }
        let mut lines = vec![format!("{} sprint(s) in '{}':", self.count, self.project)];
        for s in &self.sprints {
            let marker = if s.active { " (active)" } else { "" };
            lines.push(format!(
                "  {} {}..{} {} tasks{}",
                s.name, s.start_date, s.end_date, s.tasks, marker
            ));
        }
        lines.join("\n")
    }
}

pub fn sprint_list(storage: &Storage, project: &str) -> Result<SprintList> {
    let today = storage.clock().today();
    let sprints: Vec<SprintSummary> = storage
        .list_sprints(project)?
        .into_iter()
        .map(|s| SprintSummary {
            active: s.is_active_on(today),
            tasks: s.task_ids.len(),
            name: s.name,
            start_date: s.start_date,
            end_date: s.end_date,
        })
        .collect();
    Ok(SprintList {
        project: project.to_string(),
        count: sprints.len(),
        sprints,
    })
}

#[derive(Serialize)]
pub struct SprintShow {
    pub project: String,
    pub sprint: Sprint,
    /// Assigned tasks that still exist
    pub tasks: Vec<Task>,
}

impl CommandResult for SprintShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.sprint;
        let mut lines = vec![format!(
            "Sprint {} ({}..{}) in '{}'",
            s.name, s.start_date, s.end_date, self.project
        )];
        if self.tasks.is_empty() {
            lines.push("  (no tasks)".to_string());
        }
        for t in &self.tasks {
            lines.push(format!("  [{}] {} {}", t.status, t.id, t.title));
        }
        let missing = s.task_ids.len().saturating_sub(self.tasks.len());
        if missing > 0 {
            lines.push(format!("  {} assigned task(s) no longer exist", missing));
        }
        lines.join("\n")
    }
}

pub fn sprint_show(storage: &Storage, project: &str, name: &str) -> Result<SprintShow> {
    let sprint = storage.get_sprint(project, name)?;
    let tasks = storage.sprint_tasks(project, name)?;
    Ok(SprintShow {
        project: project.to_string(),
        sprint,
        tasks,
    })
}

#[derive(Serialize)]
pub struct SprintAssignment {
    pub project: String,
    pub sprint: String,
    pub task_id: String,
    pub assigned: bool,
}

impl CommandResult for SprintAssignment {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.assigned {
            format!("Assigned {} to sprint '{}'", self.task_id, self.sprint)
        } else {
            format!("Unassigned {} from sprint '{}'", self.task_id, self.sprint)
        }
    }
}

pub fn sprint_assign(
    storage: &Storage,
    project: &str,
    sprint: &str,
    task_id: &str,
) -> Result<SprintAssignment> {
    storage.assign_task_to_sprint(project, sprint, task_id)?;
    Ok(SprintAssignment {
        project: project.to_string(),
        sprint: sprint.to_string(),
        task_id: task_id.to_string(),
        assigned: true,
    })
}

pub fn sprint_unassign(
    storage: &Storage,
    project: &str,
    sprint: &str,
    task_id: &str,
) -> Result<SprintAssignment> {
    storage.unassign_task_from_sprint(project, sprint, task_id)?;
    Ok(SprintAssignment {
        project: project.to_string(),
        sprint: sprint.to_string(),
        task_id: task_id.to_string(),
        assigned: false,
    })
}
