use serde::Serialize;

use super::{CommandResult, join_tags, json, module_path};
use crate::Result;
use crate::models::Module;
use crate::storage::{ModuleEdit, Storage};

/// A module after it was created or edited.
#[derive(Serialize)]
pub struct ModuleResult {
    pub project: String,
    pub action: &'static str,
    pub module: Module,
}

impl CommandResult for ModuleResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let verb = match self.action {
            "created" => "Created",
            _ => "Updated",
        };
        format!("{} module '{}/{}'", verb, self.project, self.module.name)
    }
}

pub fn module_create(
    storage: &Storage,
    path: &str,
    description: &str,
    tags: Vec<String>,
) -> Result<ModuleResult> {
    let (project, name) = module_path(path)?;
    let module = storage.add_module(project, name, description, tags)?;
    Ok(ModuleResult {
        project: project.to_string(),
        action: "created",
        module,
    })
}

pub fn module_edit(
    storage: &Storage,
    path: &str,
    name: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
) -> Result<ModuleResult> {
    let (project, current) = module_path(path)?;
    let edit = ModuleEdit {
        name,
        description,
        tags,
    };
    let module = storage.update_module(project, current, edit)?;
    Ok(ModuleResult {
        project: project.to_string(),
        action: "updated",
        module,
    })
}

#[derive(Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct ModuleList {
    pub project: String,
    pub modules: Vec<ModuleSummary>,
    pub count: usize,
}

impl CommandResult for ModuleList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.modules.is_empty() {
            return format!("No modules in '{}'.", self.project);
        }
        let mut lines = vec![format!("{} module(s) in '{}':", self.count, self.project)];
        for m in &self.modules {
            lines.push(format!("  {} ({} tasks){}", m.name, m.tasks, join_tags(&m.tags)));
        }
        lines.join("\n")
    }
}

pub fn module_list(storage: &Storage, project: &str) -> Result<ModuleList> {
    let modules: Vec<ModuleSummary> = storage
        .list_modules(project)?
        .into_iter()
        .map(|m| ModuleSummary {
            tasks: m.tasks.len(),
            name: m.name,
            description: m.description,
            tags: m.tags,
        })
        .collect();
    Ok(ModuleList {
        project: project.to_string(),
        count: modules.len(),
        modules,
    })
}

#[derive(Serialize)]
pub struct ModuleShow {
    pub project: String,
    pub module: Module,
}

impl CommandResult for ModuleShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let m = &self.module;
        let mut lines = vec![format!("{}/{}{}", self.project, m.name, join_tags(&m.tags))];
        if !m.description.is_empty() {
            lines.push(format!("  {}", m.description));
        }
        if m.tasks.is_empty() {
            lines.push("  (no tasks)".to_string());
        }
        for t in &m.tasks {
            lines.push(format!("  [{}] {} {}", t.status, t.id, t.title));
        }
        lines.join("\n")
    }
}

pub fn module_show(storage: &Storage, path: &str) -> Result<ModuleShow> {
    let (project, name) = module_path(path)?;
    let module = storage.get_module(project, name)?;
    Ok(ModuleShow {
        project: project.to_string(),
        module,
    })
}

#[derive(Serialize)]
pub struct ModuleRemoved {
    pub project: String,
    pub module: String,
    pub tasks_removed: usize,
}

impl CommandResult for ModuleRemoved {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Removed module '{}/{}' ({} tasks)",
            self.project, self.module, self.tasks_removed
        )
    }
}

pub fn module_remove(storage: &Storage, path: &str) -> Result<ModuleRemoved> {
    let (project, name) = module_path(path)?;
    let module = storage.remove_module(project, name)?;
    Ok(ModuleRemoved {
        project: project.to_string(),
        module: module.name,
        tasks_removed: module.tasks.len(),
    })
}
