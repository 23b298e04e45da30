//! Project, module and sprint operations.

use chrono::NaiveDate;
use std::fs;
use std::io;

use super::{Storage, validate_name};
use crate::models::{Module, Project, ProjectStats, Sprint, Task};
use crate::{Error, Result};

/// Changes to apply to a module. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ModuleEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Storage {
    /// Create and persist an empty project.
    pub fn create_project(&self, name: &str, description: &str, tags: Vec<String>) -> Result<Project> {
        validate_name("Project", name)?;
        if self.project_exists(name) {
            return Err(Error::Conflict {
                kind: "Project",
                name: name.to_string(),
            });
        }

        let project = Project::new(
            name.to_string(),
            description.to_string(),
            tags,
            self.clock.now(),
        );
        self.save_project(&project)?;
        tracing::info!(project = name, "created project");
        Ok(project)
    }

    /// Delete a project document and drop its cache and index entries.
    pub fn delete_project(&self, name: &str) -> Result<()> {
        validate_name("Project", name)?;
        if !self.project_exists(name) {
            return Err(Error::ProjectNotFound(name.to_string()));
        }

        self.cache.invalidate(name);
        let path = self.paths.project_file(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(Error::IoAt { path, source }),
        }
        self.index.remove_project(name);
        tracing::info!(project = name, "deleted project");
        Ok(())
    }

    /// Rename a project. The new document is written before the old one is
    /// removed.
    pub fn rename_project(&self, old: &str, new: &str) -> Result<Project> {
        validate_name("Project", new)?;
        let mut project = self.load_project(old)?;
        if old == new {
            return Ok(project);
        }
        if self.project_exists(new) {
            return Err(Error::Conflict {
                kind: "Project",
                name: new.to_string(),
            });
        }

        project.name = new.to_string();
        self.save_project(&project)?;
        self.delete_project(old)?;
        self.rename_tracked_project(old, new)?;
        tracing::info!(from = old, to = new, "renamed project");
        Ok(project)
    }

    pub fn project_stats(&self, name: &str) -> Result<ProjectStats> {
        Ok(self.load_project(name)?.stats())
    }

    // === Modules ===

    pub fn add_module(
        &self,
        project: &str,
        name: &str,
        description: &str,
        tags: Vec<String>,
    ) -> Result<Module> {
        validate_name("Module", name)?;
        let now = self.clock.now();
        self.update_project(project, |p| {
            if p.module(name).is_some() {
                return Err(Error::Conflict {
                    kind: "Module",
                    name: name.to_string(),
                });
            }
            let module = Module {
                name: name.to_string(),
                description: description.to_string(),
                tags,
                tasks: Vec::new(),
                created_at: now,
            };
            p.modules.push(module.clone());
            Ok(module)
        })
    }

    pub fn get_module(&self, project: &str, name: &str) -> Result<Module> {
        self.load_project(project)?
            .module(name)
            .cloned()
            .ok_or_else(|| module_not_found(project, name))
    }

    pub fn list_modules(&self, project: &str) -> Result<Vec<Module>> {
        Ok(self.load_project(project)?.modules)
    }

    /// Edit a module. Renaming onto an existing module is a conflict.
    pub fn update_module(&self, project: &str, name: &str, edit: ModuleEdit) -> Result<Module> {
        if let Some(ref new_name) = edit.name {
            validate_name("Module", new_name)?;
        }
        self.update_project(project, |p| {
            if p.module(name).is_none() {
                return Err(module_not_found(project, name));
            }
            if let Some(ref new_name) = edit.name {
                if new_name != name && p.module(new_name).is_some() {
                    return Err(Error::Conflict {
                        kind: "Module",
                        name: new_name.clone(),
                    });
                }
            }
            let module = p
                .module_mut(name)
                .ok_or_else(|| module_not_found(project, name))?;
            if let Some(new_name) = edit.name {
                module.name = new_name;
            }
            if let Some(description) = edit.description {
                module.description = description;
            }
            if let Some(tags) = edit.tags {
                module.tags = tags;
            }
            Ok(module.clone())
        })
    }

    /// Remove a module together with its tasks.
    pub fn remove_module(&self, project: &str, name: &str) -> Result<Module> {
        self.update_project(project, |p| {
            let pos = p
                .modules
                .iter()
                .position(|m| m.name == name)
                .ok_or_else(|| module_not_found(project, name))?;
            Ok(p.modules.remove(pos))
        })
    }

    // === Sprints ===

    pub fn add_sprint(
        &self,
        project: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Sprint> {
        if name.trim().is_empty() {
            return Err(Error::ValidationFailed("Sprint name cannot be empty".to_string()));
        }
        if end_date < start_date {
            return Err(Error::ValidationFailed(format!(
                "Sprint end date {} is before start date {}",
                end_date, start_date
            )));
        }
        let now = self.clock.now();
        self.update_project(project, |p| {
            if p.sprint(name).is_some() {
                return Err(Error::Conflict {
                    kind: "Sprint",
                    name: name.to_string(),
                });
            }
            let sprint = Sprint {
                name: name.to_string(),
                start_date,
                end_date,
                task_ids: Vec::new(),
                created_at: now,
            };
            p.sprints.push(sprint.clone());
            Ok(sprint)
        })
    }

    pub fn get_sprint(&self, project: &str, name: &str) -> Result<Sprint> {
        self.load_project(project)?
            .sprint(name)
            .cloned()
            .ok_or_else(|| sprint_not_found(project, name))
    }

    pub fn list_sprints(&self, project: &str) -> Result<Vec<Sprint>> {
        Ok(self.load_project(project)?.sprints)
    }

    /// Tasks assigned to a sprint that still exist in the project.
    pub fn sprint_tasks(&self, project: &str, name: &str) -> Result<Vec<Task>> {
        let p = self.load_project(project)?;
        let sprint = p.sprint(name).ok_or_else(|| sprint_not_found(project, name))?;
        Ok(sprint
            .task_ids
            .iter()
            .filter_map(|id| p.find_task(id).map(|(t, _)| t.clone()))
            .collect())
    }

    /// Remove a sprint. Its tasks are not touched.
    pub fn remove_sprint(&self, project: &str, name: &str) -> Result<Sprint> {
        self.update_project(project, |p| {
            let pos = p
                .sprints
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| sprint_not_found(project, name))?;
            Ok(p.sprints.remove(pos))
        })
    }

    /// Add a task to a sprint. Assigning twice is a no-op.
    pub fn assign_task_to_sprint(&self, project: &str, sprint: &str, task_id: &str) -> Result<()> {
        self.update_project(project, |p| {
            if !p.contains_task(task_id) {
                return Err(task_not_found(project, task_id));
            }
            let s = p
                .sprint_mut(sprint)
                .ok_or_else(|| sprint_not_found(project, sprint))?;
            if !s.task_ids.iter().any(|id| id == task_id) {
                s.task_ids.push(task_id.to_string());
            }
            Ok(())
        })
    }

    pub fn unassign_task_from_sprint(&self, project: &str, sprint: &str, task_id: &str) -> Result<()> {
        self.update_project(project, |p| {
            let s = p
                .sprint_mut(sprint)
                .ok_or_else(|| sprint_not_found(project, sprint))?;
            let pos = s.task_ids.iter().position(|id| id == task_id).ok_or_else(|| {
                Error::NotFound(format!(
                    "Task '{}' is not assigned to sprint '{}'",
                    task_id, sprint
                ))
            })?;
            s.task_ids.remove(pos);
            Ok(())
        })
    }
}

pub(crate) fn module_not_found(project: &str, module: &str) -> Error {
    Error::ModuleNotFound {
        project: project.to_string(),
        module: module.to_string(),
    }
}

pub(crate) fn sprint_not_found(project: &str, sprint: &str) -> Error {
    Error::SprintNotFound {
        project: project.to_string(),
        sprint: sprint.to_string(),
    }
}

pub(crate) fn task_not_found(project: &str, task_id: &str) -> Error {
    Error::TaskNotFound {
        project: project.to_string(),
        task_id: task_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::storage::NewTask;
    use crate::test_utils::TestEnv;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_project() {
        let env = TestEnv::new();
        let storage = env.open_storage();

        let project = storage
            .create_project("demo", "A demo", vec!["work".into()])
            .unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.created_at, env.clock.now());
        assert!(env.paths().project_file("demo").is_file());
        assert!(!storage.is_dirty("demo"));
    }

    #[test]
    fn test_create_duplicate_project_conflicts() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        let err = storage.create_project("demo", "", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_create_project_rejects_bad_names() {
        let env = TestEnv::new();
        let storage = env.open_storage();
        assert!(storage.create_project("", "", Vec::new()).is_err());
        assert!(storage.create_project("../escape", "", Vec::new()).is_err());
    }

    #[test]
    fn test_path_like_names_stay_inside_projects_dir() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        storage.add_task("demo", None, NewTask::titled("A")).unwrap();
        storage.sync_index().unwrap();
        let victim = env.data_path().join("victim.json");
        fs::write(&victim, b"{}").unwrap();

        assert!(matches!(
            storage.delete_project("../index"),
            Err(Error::ValidationFailed(_))
        ));
        assert!(env.paths().index_file().is_file());
        assert!(storage.delete_project("../victim").is_err());
        assert!(storage.load_project("../victim").is_err());
        assert!(storage.update_project("../victim", |_| Ok(())).is_err());
        assert!(storage.find_orphaned_references("../victim").is_err());
        assert!(!storage.project_exists("../victim"));
        assert_eq!(fs::read(&victim).unwrap(), b"{}");
    }

    #[test]
    fn test_delete_project() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        let task = storage.add_task("demo", None, NewTask::titled("A")).unwrap();

        storage.delete_project("demo").unwrap();
        assert!(!env.paths().project_file("demo").exists());
        assert!(storage.lookup_task(&task.id).is_none());
        assert!(matches!(
            storage.load_project("demo"),
            Err(Error::ProjectNotFound(_))
        ));
        assert!(matches!(
            storage.delete_project("demo"),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_rename_project_moves_document_and_index() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("old");
        storage.create_project("taken", "", Vec::new()).unwrap();
        let task = storage.add_task("old", None, NewTask::titled("A")).unwrap();

        assert!(matches!(
            storage.rename_project("old", "taken"),
            Err(Error::Conflict { .. })
        ));

        storage.rename_project("old", "new").unwrap();
        assert!(!env.paths().project_file("old").exists());
        assert!(env.paths().project_file("new").exists());
        assert_eq!(storage.lookup_task(&task.id).unwrap().project, "new");
        assert_eq!(storage.load_project("new").unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_module_lifecycle() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");

        storage.add_module("demo", "api", "HTTP layer", Vec::new()).unwrap();
        let err = storage.add_module("demo", "api", "", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Conflict { kind: "Module", .. }));

        let module = storage.get_module("demo", "api").unwrap();
        assert_eq!(module.description, "HTTP layer");
        assert!(matches!(
            storage.get_module("demo", "ui"),
            Err(Error::ModuleNotFound { .. })
        ));

        storage.remove_module("demo", "api").unwrap();
        assert!(storage.list_modules("demo").unwrap().is_empty());
    }

    #[test]
    fn test_module_rename_updates_index_location() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        storage.add_module("demo", "api", "", Vec::new()).unwrap();
        storage.add_module("demo", "web", "", Vec::new()).unwrap();
        let task = storage
            .add_task("demo", Some("api"), NewTask::titled("Endpoint"))
            .unwrap();

        let edit = ModuleEdit {
            name: Some("web".into()),
            ..Default::default()
        };
        assert!(matches!(
            storage.update_module("demo", "api", edit),
            Err(Error::Conflict { .. })
        ));

        let edit = ModuleEdit {
            name: Some("backend".into()),
            description: Some("renamed".into()),
            ..Default::default()
        };
        let module = storage.update_module("demo", "api", edit).unwrap();
        assert_eq!(module.name, "backend");
        assert_eq!(
            storage.lookup_task(&task.id).unwrap().location,
            "module:backend"
        );
    }

    #[test]
    fn test_sprint_dates_validated() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");

        let err = storage
            .add_sprint("demo", "s1", day(2026, 2, 1), day(2026, 1, 31))
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));

        storage
            .add_sprint("demo", "s1", day(2026, 2, 1), day(2026, 2, 1))
            .unwrap();
        assert!(matches!(
            storage.add_sprint("demo", "s1", day(2026, 2, 1), day(2026, 2, 14)),
            Err(Error::Conflict { kind: "Sprint", .. })
        ));
    }

    #[test]
    fn test_sprint_assignment() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        storage
            .add_sprint("demo", "s1", day(2026, 1, 12), day(2026, 1, 23))
            .unwrap();
        let task = storage.add_task("demo", None, NewTask::titled("A")).unwrap();

        storage.assign_task_to_sprint("demo", "s1", &task.id).unwrap();
        storage.assign_task_to_sprint("demo", "s1", &task.id).unwrap();
        assert_eq!(storage.get_sprint("demo", "s1").unwrap().task_ids.len(), 1);
        assert_eq!(storage.sprint_tasks("demo", "s1").unwrap()[0].id, task.id);

        assert!(matches!(
            storage.assign_task_to_sprint("demo", "s1", "ffffffff"),
            Err(Error::TaskNotFound { .. })
        ));
        assert!(matches!(
            storage.assign_task_to_sprint("demo", "s9", &task.id),
            Err(Error::SprintNotFound { .. })
        ));

        storage.unassign_task_from_sprint("demo", "s1", &task.id).unwrap();
        assert!(storage
            .unassign_task_from_sprint("demo", "s1", &task.id)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_remove_sprint_keeps_tasks() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("demo");
        storage
            .add_sprint("demo", "s1", day(2026, 1, 12), day(2026, 1, 23))
            .unwrap();
        let task = storage.add_task("demo", None, NewTask::titled("A")).unwrap();
        storage.assign_task_to_sprint("demo", "s1", &task.id).unwrap();

        storage.remove_sprint("demo", "s1").unwrap();
        assert!(storage.list_sprints("demo").unwrap().is_empty());
        assert!(storage.find_task("demo", &task.id).is_ok());
    }
}
