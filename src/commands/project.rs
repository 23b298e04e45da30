use serde::Serialize;

use super::{CommandResult, format_hours, join_tags, json};
use crate::Result;
use crate::models::{Project, ProjectStats};
use crate::storage::Storage;

#[derive(Serialize)]
pub struct ProjectCreated {
    pub name: String,
    pub created: bool,
}

impl CommandResult for ProjectCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Created project '{}'", self.name)
    }
}

pub fn project_create(
    storage: &Storage,
    name: &str,
    description: &str,
    tags: Vec<String>,
) -> Result<ProjectCreated> {
    let project = storage.create_project(name, description, tags)?;
    Ok(ProjectCreated {
        name: project.name,
        created: true,
    })
}

#[derive(Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub description: String,
    pub modules: usize,
    pub tasks: usize,
    pub completion_pct: f64,
}

#[derive(Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectSummary>,
    pub count: usize,
}

impl CommandResult for ProjectList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects.".to_string();
        }
        let mut lines = vec![format!("{} project(s):", self.count)];
        for p in &self.projects {
            let mut line = format!(
                "  {} ({} modules, {} tasks, {:.0}% done)",
                p.name, p.modules, p.tasks, p.completion_pct
            );
            if !p.description.is_empty() {
                line.push_str(&format!(" - {}", p.description));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

pub fn project_list(storage: &Storage) -> Result<ProjectList> {
    let projects: Vec<ProjectSummary> = storage
        .all_projects()?
        .into_iter()
        .map(|p| ProjectSummary {
            modules: p.modules.len(),
            tasks: p.all_tasks().count(),
            completion_pct: p.completion_percentage(),
            name: p.name,
            description: p.description,
        })
        .collect();
    Ok(ProjectList {
        count: projects.len(),
        projects,
    })
}

#[derive(Serialize)]
pub struct ProjectShow {
    pub project: Project,
    pub stats: ProjectStats,
}

impl CommandResult for ProjectShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.project;
        let mut lines = vec![format!("{}{}", p.name, join_tags(&p.tags))];
        if !p.description.is_empty() {
            lines.push(format!("  {}", p.description));
        }
        lines.push(format!(
            "  {} tasks, {:.0}% done, {} estimated, {} logged",
            self.stats.total_tasks,
            self.stats.completion_pct,
            format_hours(self.stats.total_estimated),
            format_hours(self.stats.total_actual)
        ));

        if !p.tasks.is_empty() {
            lines.push(String::new());
            lines.push("Tasks:".to_string());
            for t in &p.tasks {
                lines.push(format!("  [{}] {} {}", t.status, t.id, t.title));
            }
        }
        for m in &p.modules {
            lines.push(String::new());
            lines.push(format!("Module {} ({} tasks):", m.name, m.tasks.len()));
            for t in &m.tasks {
                lines.push(format!("  [{}] {} {}", t.status, t.id, t.title));
            }
        }
        if !p.sprints.is_empty() {
            lines.push(String::new());
            lines.push("Sprints:".to_string());
            for s in &p.sprints {
                lines.push(format!(
                    "  {} {}..{} ({} tasks)",
                    s.name,
                    s.start_date,
                    s.end_date,
                    s.task_ids.len()
                ));
            }
        }
        lines.join("\n")
    }
}

pub fn project_show(storage: &Storage, name: &str) -> Result<ProjectShow> {
    let project = storage.load_project(name)?;
    let stats = project.stats();
    Ok(ProjectShow { project, stats })
}

#[derive(Serialize)]
pub struct ProjectDeleted {
    pub name: String,
    pub deleted: bool,
}

impl CommandResult for ProjectDeleted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Deleted project '{}'", self.name)
    }
}

pub fn project_delete(storage: &Storage, name: &str) -> Result<ProjectDeleted> {
    storage.delete_project(name)?;
    Ok(ProjectDeleted {
        name: name.to_string(),
        deleted: true,
    })
}

#[derive(Serialize)]
pub struct ProjectRenamed {
    pub old_name: String,
    pub new_name: String,
}

impl CommandResult for ProjectRenamed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Renamed project '{}' to '{}'", self.old_name, self.new_name)
    }
}

pub fn project_rename(storage: &Storage, old: &str, new: &str) -> Result<ProjectRenamed> {
    let project = storage.rename_project(old, new)?;
    Ok(ProjectRenamed {
        old_name: old.to_string(),
        new_name: project.name,
    })
}

#[derive(Serialize)]
pub struct ProjectStatsResult {
    pub name: String,
    #[serde(flatten)]
    pub stats: ProjectStats,
}

impl CommandResult for ProjectStatsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.stats;
        [
            format!("Project: {}", self.name),
            format!(
                "  Tasks: {} (todo {}, doing {}, done {}, blocked {})",
                s.total_tasks, s.todo, s.doing, s.done, s.blocked
            ),
            format!("  Completion: {:.1}%", s.completion_pct),
            format!("  Estimated: {}", format_hours(s.total_estimated)),
            format!("  Logged: {}", format_hours(s.total_actual)),
            format!("  Modules: {}  Sprints: {}", s.module_count, s.sprint_count),
        ]
        .join("\n")
    }
}

pub fn project_stats(storage: &Storage, name: &str) -> Result<ProjectStatsResult> {
    let stats = storage.project_stats(name)?;
    Ok(ProjectStatsResult {
        name: name.to_string(),
        stats,
    })
}
