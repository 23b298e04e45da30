//! Consistency checks.
//!
//! Findings are data, not errors: nothing here repairs anything.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::{CacheStats, IndexStats, Storage};
use crate::Result;

/// Dangling references inside one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    pub parent_references: Vec<String>,
    pub dependency_references: Vec<String>,
    pub sprint_references: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.parent_references.len() + self.dependency_references.len() + self.sprint_references.len()
    }
}

/// Overall state of the data directory.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub projects: usize,
    pub index_stale: bool,
    pub index_errors: Vec<String>,
    /// Only projects with at least one orphaned reference
    pub orphans: BTreeMap<String, OrphanReport>,
    pub cache: CacheStats,
    pub index: IndexStats,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        !self.index_stale && self.index_errors.is_empty() && self.orphans.is_empty()
    }
}

impl Storage {
    /// Parent, dependency and sprint references that point at no task in
    /// the project.
    pub fn find_orphaned_references(&self, project: &str) -> Result<OrphanReport> {
        let p = self.load_project(project)?;
        let ids: HashSet<&str> = p.all_tasks().map(|t| t.id.as_str()).collect();
        let mut report = OrphanReport::default();

        for task in p.all_tasks() {
            if let Some(ref parent) = task.parent_id {
                if !ids.contains(parent.as_str()) {
                    report.parent_references.push(format!(
                        "Task {} references non-existent parent {}",
                        task.id, parent
                    ));
                }
            }
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    report.dependency_references.push(format!(
                        "Task {} depends on non-existent task {}",
                        task.id, dep
                    ));
                }
            }
        }

        for sprint in &p.sprints {
            for id in &sprint.task_ids {
                if !ids.contains(id.as_str()) {
                    report.sprint_references.push(format!(
                        "Sprint {} references non-existent task {}",
                        sprint.name, id
                    ));
                }
            }
        }

        Ok(report)
    }

    /// Compare the index with the project documents in both directions.
    pub fn validate_index(&self) -> Result<Vec<String>> {
        let snapshot = self.index.snapshot();
        let mut errors = Vec::new();

        for (task_id, loc) in &snapshot {
            let found = match self.load_project(&loc.project) {
                Ok(p) => p.find_task(task_id).map(|(_, location)| location),
                Err(_) => None,
            };
            match found {
                None => errors.push(format!(
                    "Index references task {} in {} but task not found",
                    task_id, loc.project
                )),
                Some(location) if location != loc.location => errors.push(format!(
                    "Index places task {} at {} but it is at {}",
                    task_id, loc.location, location
                )),
                Some(_) => {}
            }
        }

        for p in self.all_projects()? {
            for task in p.all_tasks() {
                if !snapshot.contains_key(&task.id) {
                    errors.push(format!("Task {} in project {} not indexed", task.id, p.name));
                }
            }
        }

        Ok(errors)
    }

    pub fn health_check(&self) -> Result<HealthReport> {
        let index_stale = self.is_index_stale()?;
        let index_errors = self.validate_index()?;

        let names = self.list_projects()?;
        let mut orphans = BTreeMap::new();
        for name in &names {
            match self.find_orphaned_references(name) {
                Ok(report) if !report.is_empty() => {
                    orphans.insert(name.clone(), report);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(project = %name, error = %e, "skipping project in health check"),
            }
        }

        Ok(HealthReport {
            projects: names.len(),
            index_stale,
            index_errors,
            orphans,
            cache: self.cache_stats(),
            index: self.index_stats(),
        })
    }
}
