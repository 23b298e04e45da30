use chrono::NaiveDate;
use serde::Serialize;

use super::{
    CommandResult, date_or_today, format_date, format_hours, join_tags, json, owning_project,
};
use crate::Result;
use crate::config::ResolvedSettings;
use crate::models::{Recurrence, Task, TaskLocation, TaskStatus, split_path};
use crate::storage::{NewTask, Storage, TaskEdit, parse_priority, parse_status};

/// Fields for `task create` beyond its path and title.
#[derive(Debug, Default)]
pub struct TaskCreateArgs {
    pub description: String,
    pub priority: Option<String>,
    pub estimate: Option<f64>,
    pub tags: Vec<String>,
    pub jira: Option<String>,
    pub parent: Option<String>,
}

#[derive(Serialize)]
pub struct TaskCreated {
    pub id: String,
    pub project: String,
    pub location: String,
    pub title: String,
}

impl CommandResult for TaskCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Created task {} \"{}\" in {}", self.id, self.title, self.project)
    }
}

pub fn task_create(
    storage: &Storage,
    settings: &ResolvedSettings,
    path: &str,
    title: &str,
    args: TaskCreateArgs,
) -> Result<TaskCreated> {
    let (project, module) = split_path(path);
    let priority = match args.priority {
        Some(p) => parse_priority(&p)?,
        None => settings.default_priority.value,
    };
    let new = NewTask {
        title: title.to_string(),
        description: args.description,
        priority: Some(priority),
        estimated_hours: args.estimate.unwrap_or(0.0),
        tags: args.tags,
        jira_issue: args.jira,
        parent_id: args.parent,
    };
    let task = storage.add_task(project, module, new)?;
    let location = TaskLocation::new(project, location_tag(module));
    Ok(TaskCreated {
        id: task.id,
        project: location.project,
        location: location.location,
        title: task.title,
    })
}

fn location_tag(module: Option<&str>) -> String {
    match module {
        Some(m) => crate::models::module_location(m),
        None => crate::models::PROJECT_LOCATION.to_string(),
    }
}

#[derive(Serialize)]
pub struct TaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub location: String,
    pub actual_hours: f64,
}

#[derive(Serialize)]
pub struct TaskList {
    pub path: String,
    pub tasks: Vec<TaskRow>,
    pub count: usize,
}

impl CommandResult for TaskList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return format!("No tasks in '{}'.", self.path);
        }
        let mut lines = vec![format!("{} task(s) in '{}':", self.count, self.path)];
        for row in &self.tasks {
            let t = &row.task;
            let mut line = format!("  [{}] {} {} ({})", t.status, t.id, t.title, t.priority);
            if t.estimated_hours > 0.0 || row.actual_hours > 0.0 {
                line.push_str(&format!(
                    " {}/{}",
                    format_hours(row.actual_hours),
                    format_hours(t.estimated_hours)
                ));
            }
            if row.location != crate::models::PROJECT_LOCATION && !self.path.contains('/') {
                line.push_str(&format!(" @{}", row.location));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

pub fn task_list(storage: &Storage, path: &str, status: Option<&str>) -> Result<TaskList> {
    let (project, module) = split_path(path);
    let status: Option<TaskStatus> = status.map(parse_status).transpose()?;
    let tasks: Vec<TaskRow> = storage
        .list_tasks(project, module)?
        .into_iter()
        .filter(|(t, _)| status.is_none_or(|s| t.status == s))
        .map(|(task, location)| TaskRow {
            actual_hours: task.actual_hours(),
            task,
            location,
        })
        .collect();
    Ok(TaskList {
        path: path.to_string(),
        count: tasks.len(),
        tasks,
    })
}

#[derive(Serialize)]
pub struct TaskShow {
    pub project: String,
    pub location: String,
    pub task: Task,
    pub actual_hours: f64,
    pub variance: f64,
    pub variance_pct: f64,
    pub over_budget: bool,
    pub children: Vec<String>,
    pub dependents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira_link: Option<String>,
    #[serde(skip)]
    pub date_format: String,
}

impl CommandResult for TaskShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let t = &self.task;
        let mut lines = vec![
            format!("{} {}{}", t.id, t.title, join_tags(&t.tags)),
            format!("  Project: {} ({})", self.project, self.location),
            format!("  Status: {}  Priority: {}", t.status, t.priority),
            format!(
                "  Hours: {} logged of {} estimated",
                format_hours(self.actual_hours),
                format_hours(t.estimated_hours)
            ),
        ];
        if self.over_budget {
            lines.push(format!(
                "  Over budget by {} ({:.0}%)",
                format_hours(self.variance),
                self.variance_pct
            ));
        }
        if !t.description.is_empty() {
            lines.push(format!("  {}", t.description));
        }
        if let Some(ref parent) = t.parent_id {
            lines.push(format!("  Parent: {}", parent));
        }
        if !self.children.is_empty() {
            lines.push(format!("  Children: {}", self.children.join(", ")));
        }
        if !t.dependencies.is_empty() {
            lines.push(format!("  Depends on: {}", t.dependencies.join(", ")));
        }
        if !self.dependents.is_empty() {
            lines.push(format!("  Needed by: {}", self.dependents.join(", ")));
        }
        if let Some(ref issue) = t.jira_issue {
            match self.jira_link {
                Some(ref link) => lines.push(format!("  Jira: {} ({})", issue, link)),
                None => lines.push(format!("  Jira: {}", issue)),
            }
        }
        if let Some(ref r) = t.recurrence {
            lines.push(format!(
                "  Repeats: {}, next {}",
                r.pattern(),
                format_date(r.next_due, &self.date_format)
            ));
        }
        lines.push(format!(
            "  Created: {}",
            format_date(t.created_at.date_naive(), &self.date_format)
        ));
        if !t.time_entries.is_empty() {
            lines.push("  Time entries:".to_string());
            for e in &t.time_entries {
                lines.push(format!(
                    "    {} {}",
                    format_date(e.date, &self.date_format),
                    format_hours(e.hours)
                ));
            }
        }
        lines.join("\n")
    }
}

pub fn task_show(
    storage: &Storage,
    settings: &ResolvedSettings,
    task_id: &str,
    project: Option<&str>,
) -> Result<TaskShow> {
    let (task, location) = match project {
        Some(p) => {
            let (task, location) = storage.find_task(p, task_id)?;
            (task, TaskLocation::new(p, location))
        }
        None => storage.locate_task(task_id)?,
    };
    let ids = |tasks: Vec<Task>| tasks.into_iter().map(|t| t.id).collect::<Vec<_>>();
    let children = ids(storage.child_tasks(&location.project, task_id)?);
    let dependents = ids(storage.dependent_tasks(&location.project, task_id)?);
    let jira_link = task.jira_issue.as_deref().and_then(|i| settings.jira_link(i));

    Ok(TaskShow {
        project: location.project,
        location: location.location,
        actual_hours: task.actual_hours(),
        variance: task.variance(),
        variance_pct: task.variance_percentage(),
        over_budget: task.is_over_budget(),
        children,
        dependents,
        jira_link,
        date_format: settings.date_format.value.clone(),
        task,
    })
}

/// A task after a status change or an edit.
#[derive(Serialize)]
pub struct TaskUpdated {
    pub project: String,
    pub task: Task,
}

impl CommandResult for TaskUpdated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let t = &self.task;
        let mut out = format!("Updated task {} [{}] {}", t.id, t.status, t.title);
        if let Some(ref r) = t.recurrence {
            out.push_str(&format!(" (next due {})", r.next_due));
        }
        out
    }
}

pub fn task_update(
    storage: &Storage,
    task_id: &str,
    status: &str,
    project: Option<&str>,
) -> Result<TaskUpdated> {
    let status = parse_status(status)?;
    let project = owning_project(storage, project, task_id)?;
    let task = storage.set_task_status(&project, task_id, status)?;
    Ok(TaskUpdated { project, task })
}

pub fn task_complete(storage: &Storage, task_id: &str, project: Option<&str>) -> Result<TaskUpdated> {
    let project = owning_project(storage, project, task_id)?;
    let task = storage.complete_task(&project, task_id)?;
    Ok(TaskUpdated { project, task })
}

/// Optional field changes for `task edit`.
#[derive(Debug, Default)]
pub struct TaskEditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub estimate: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub jira: Option<String>,
}

pub fn task_edit(
    storage: &Storage,
    task_id: &str,
    project: Option<&str>,
    args: TaskEditArgs,
) -> Result<TaskUpdated> {
    let edit = TaskEdit {
        title: args.title,
        description: args.description,
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
        estimated_hours: args.estimate,
        tags: args.tags,
        jira_issue: args.jira,
    };
    let project = owning_project(storage, project, task_id)?;
    let task = storage.edit_task(&project, task_id, edit)?;
    Ok(TaskUpdated { project, task })
}

#[derive(Serialize)]
pub struct TaskRemoved {
    pub project: String,
    pub id: String,
    pub title: String,
}

impl CommandResult for TaskRemoved {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Removed task {} \"{}\" from {}", self.id, self.title, self.project)
    }
}

pub fn task_remove(storage: &Storage, task_id: &str, project: Option<&str>) -> Result<TaskRemoved> {
    let project = owning_project(storage, project, task_id)?;
    let task = storage.remove_task(&project, task_id)?;
    Ok(TaskRemoved {
        project,
        id: task.id,
        title: task.title,
    })
}

/// A parent or dependency link that was added or removed.
#[derive(Serialize)]
pub struct TaskLinkResult {
    pub project: String,
    pub task_id: String,
    pub relation: &'static str,
    pub target: Option<String>,
    pub linked: bool,
}

impl CommandResult for TaskLinkResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match (self.relation, self.linked, self.target.as_deref()) {
            ("parent", true, Some(target)) => format!("{} is now a child of {}", self.task_id, target),
            ("parent", false, _) => format!("{} no longer has a parent", self.task_id),
            (_, true, Some(target)) => format!("{} now depends on {}", self.task_id, target),
            (_, _, target) => format!(
                "{} no longer depends on {}",
                self.task_id,
                target.unwrap_or("-")
            ),
        }
    }
}

pub fn task_link(
    storage: &Storage,
    child: &str,
    parent: &str,
    project: Option<&str>,
) -> Result<TaskLinkResult> {
    let project = owning_project(storage, project, child)?;
    storage.link_task_as_child(&project, child, parent)?;
    Ok(TaskLinkResult {
        project,
        task_id: child.to_string(),
        relation: "parent",
        target: Some(parent.to_string()),
        linked: true,
    })
}

pub fn task_unlink(storage: &Storage, task_id: &str, project: Option<&str>) -> Result<TaskLinkResult> {
    let project = owning_project(storage, project, task_id)?;
    storage.unlink_task_parent(&project, task_id)?;
    Ok(TaskLinkResult {
        project,
        task_id: task_id.to_string(),
        relation: "parent",
        target: None,
        linked: false,
    })
}

pub fn task_depend(
    storage: &Storage,
    task_id: &str,
    on: &str,
    project: Option<&str>,
) -> Result<TaskLinkResult> {
    let project = owning_project(storage, project, task_id)?;
    storage.add_task_dependency(&project, task_id, on)?;
    Ok(TaskLinkResult {
        project,
        task_id: task_id.to_string(),
        relation: "dependency",
        target: Some(on.to_string()),
        linked: true,
    })
}

pub fn task_undepend(
    storage: &Storage,
    task_id: &str,
    on: &str,
    project: Option<&str>,
) -> Result<TaskLinkResult> {
    let project = owning_project(storage, project, task_id)?;
    storage.remove_task_dependency(&project, task_id, on)?;
    Ok(TaskLinkResult {
        project,
        task_id: task_id.to_string(),
        relation: "dependency",
        target: Some(on.to_string()),
        linked: false,
    })
}

#[derive(Serialize)]
pub struct TaskRecurrence {
    pub project: String,
    pub task_id: String,
    pub recurrence: Option<Recurrence>,
}

impl CommandResult for TaskRecurrence {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.recurrence {
            Some(ref r) => format!(
                "Task {} repeats {}, next due {}",
                self.task_id,
                r.pattern(),
                r.next_due
            ),
            None => format!("Task {} no longer repeats", self.task_id),
        }
    }
}

pub fn task_recur(
    storage: &Storage,
    task_id: &str,
    pattern: &str,
    project: Option<&str>,
) -> Result<TaskRecurrence> {
    let project = owning_project(storage, project, task_id)?;
    let recurrence = storage.set_task_recurrence(&project, task_id, pattern)?;
    Ok(TaskRecurrence {
        project,
        task_id: task_id.to_string(),
        recurrence: Some(recurrence),
    })
}

pub fn task_unrecur(storage: &Storage, task_id: &str, project: Option<&str>) -> Result<TaskRecurrence> {
    let project = owning_project(storage, project, task_id)?;
    storage.remove_task_recurrence(&project, task_id)?;
    Ok(TaskRecurrence {
        project,
        task_id: task_id.to_string(),
        recurrence: None,
    })
}

#[derive(Serialize)]
pub struct DueTask {
    pub project: String,
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub pattern: String,
    pub next_due: NaiveDate,
}

#[derive(Serialize)]
pub struct DueList {
    pub date: NaiveDate,
    pub tasks: Vec<DueTask>,
    pub count: usize,
}

impl CommandResult for DueList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return format!("No recurring tasks due by {}.", self.date);
        }
        let mut lines = vec![format!("{} recurring task(s) due by {}:", self.count, self.date)];
        for t in &self.tasks {
            lines.push(format!(
                "  {} {} [{}] {} (due {})",
                t.project, t.id, t.pattern, t.title, t.next_due
            ));
        }
        lines.join("\n")
    }
}

pub fn task_due(storage: &Storage, date: Option<&str>) -> Result<DueList> {
    let date = date_or_today(storage, date)?;
    let tasks: Vec<DueTask> = storage
        .recurring_tasks_due(date)?
        .into_iter()
        .filter_map(|(project, task)| {
            let recurrence = task.recurrence?;
            Some(DueTask {
                project,
                id: task.id,
                title: task.title,
                status: task.status,
                pattern: recurrence.pattern(),
                next_due: recurrence.next_due,
            })
        })
        .collect();
    Ok(DueList {
        date,
        count: tasks.len(),
        tasks,
    })
}

#[derive(Serialize)]
pub struct TimeLogged {
    pub project: String,
    pub task_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub actual_hours: f64,
}

impl CommandResult for TimeLogged {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Logged {} on {} for {} (total {})",
            format_hours(self.hours),
            self.date,
            self.task_id,
            format_hours(self.actual_hours)
        )
    }
}

pub fn task_time(
    storage: &Storage,
    task_id: &str,
    hours: f64,
    date: Option<&str>,
    project: Option<&str>,
) -> Result<TimeLogged> {
    let date = date_or_today(storage, date)?;
    let project = owning_project(storage, project, task_id)?;
    let task = storage.add_time_entry(&project, task_id, date, hours)?;
    Ok(TimeLogged {
        project,
        task_id: task.id.clone(),
        date,
        hours,
        actual_hours: task.actual_hours(),
    })
}

#[derive(Serialize)]
pub struct TaskLocated {
    pub id: String,
    pub title: String,
    pub project: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl CommandResult for TaskLocated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.module {
            Some(ref m) => format!("{} \"{}\" is in {}/{}", self.id, self.title, self.project, m),
            None => format!("{} \"{}\" is in {}", self.id, self.title, self.project),
        }
    }
}

pub fn task_locate(storage: &Storage, task_id: &str) -> Result<TaskLocated> {
    let (task, location) = storage.locate_task(task_id)?;
    Ok(TaskLocated {
        module: location.module_name().map(str::to_string),
        id: task.id,
        title: task.title,
        project: location.project,
        location: location.location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, QixConfig, resolve_settings_with_env};
    use crate::models::Priority;
    use crate::test_utils::TestEnv;

    fn settings(env: &TestEnv, file: QixConfig) -> ResolvedSettings {
        resolve_settings_with_env(&env.paths(), &file, &ConfigOverrides::default(), |_| None)
    }

    #[test]
    fn test_create_uses_configured_default_priority() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let settings = settings(
            &env,
            QixConfig {
                default_priority: Some(Priority::High),
                ..Default::default()
            },
        );

        let created =
            task_create(&storage, &settings, "web", "Fix", TaskCreateArgs::default()).unwrap();
        let (task, _) = storage.find_task("web", &created.id).unwrap();
        assert_eq!(task.priority, Priority::High);

        let args = TaskCreateArgs {
            priority: Some("low".into()),
            ..Default::default()
        };
        let created = task_create(&storage, &settings, "web", "Docs", args).unwrap();
        let (task, _) = storage.find_task("web", &created.id).unwrap();
        assert_eq!(task.priority, Priority::Low);
    }

    #[test]
    fn test_create_in_module_reports_location() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        storage.add_module("web", "api", "", Vec::new()).unwrap();
        let settings = settings(&env, QixConfig::default());

        let created =
            task_create(&storage, &settings, "web/api", "Fix", TaskCreateArgs::default()).unwrap();
        assert_eq!(created.location, "module:api");

        let located = task_locate(&storage, &created.id).unwrap();
        assert_eq!(located.module.as_deref(), Some("api"));
    }

    #[test]
    fn test_show_renders_jira_link() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let file = QixConfig {
            jira_base_url: Some("https://jira.example.com".into()),
            ..Default::default()
        };
        let settings = settings(&env, file);
        let args = TaskCreateArgs {
            jira: Some("WEB-7".into()),
            ..Default::default()
        };
        let created = task_create(&storage, &settings, "web", "Fix", args).unwrap();

        let show = task_show(&storage, &settings, &created.id, None).unwrap();
        assert_eq!(
            show.jira_link.as_deref(),
            Some("https://jira.example.com/browse/WEB-7")
        );
        assert!(show.to_human().contains("Jira: WEB-7 (https://jira.example.com/browse/WEB-7)"));
    }

    #[test]
    fn test_show_reports_budget_overrun() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let settings = settings(&env, QixConfig::default());
        let args = TaskCreateArgs {
            estimate: Some(2.0),
            ..Default::default()
        };
        let created = task_create(&storage, &settings, "web", "Fix", args).unwrap();
        let day = chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        storage.add_time_entry("web", &created.id, day, 3.0).unwrap();

        let show = task_show(&storage, &settings, &created.id, None).unwrap();
        assert!(show.over_budget);
        assert_eq!(show.variance, 1.0);
        assert_eq!(show.variance_pct, 50.0);
        assert!(show.to_human().contains("Over budget by 1.00h (50%)"));
    }

    #[test]
    fn test_list_filters_by_status() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let a = storage.add_task("web", None, NewTask::titled("A")).unwrap();
        storage.add_task("web", None, NewTask::titled("B")).unwrap();
        task_update(&storage, &a.id, "doing", None).unwrap();

        let list = task_list(&storage, "web", Some("doing")).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.tasks[0].task.id, a.id);
        assert!(task_list(&storage, "web", Some("started")).is_err());
    }

    #[test]
    fn test_commands_locate_project_when_omitted() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let task = storage.add_task("web", None, NewTask::titled("A")).unwrap();

        let logged = task_time(&storage, &task.id, 1.5, Some("2026-01-14"), None).unwrap();
        assert_eq!(logged.project, "web");
        assert_eq!(logged.actual_hours, 1.5);

        let done = task_complete(&storage, &task.id, None).unwrap();
        assert_eq!(done.task.status, TaskStatus::Done);
    }

    #[test]
    fn test_due_lists_recurring_tasks() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let task = storage.add_task("web", None, NewTask::titled("Standup")).unwrap();
        task_recur(&storage, &task.id, "daily", None).unwrap();

        // Clock is fixed at 2026-01-15, first occurrence is the 16th.
        assert_eq!(task_due(&storage, None).unwrap().count, 0);
        let due = task_due(&storage, Some("2026-01-16")).unwrap();
        assert_eq!(due.count, 1);
        assert_eq!(due.tasks[0].pattern, "daily");
    }
}
