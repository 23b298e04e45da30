use serde::Serialize;
use std::path::PathBuf;

use super::{CommandResult, json};
use crate::Result;
use crate::storage::{CacheStats, HealthReport, IndexStats, Storage};

#[derive(Serialize)]
pub struct HealthResult {
    pub healthy: bool,
    #[serde(flatten)]
    pub report: HealthReport,
}

impl CommandResult for HealthResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let r = &self.report;
        let mut lines = vec![
            format!(
                "Health: {}",
                if self.healthy { "OK" } else { "issues found" }
            ),
            format!("  Projects: {}", r.projects),
            format!(
                "  Index: {} entries{}",
                r.index.total_entries,
                if r.index_stale { " (stale)" } else { "" }
            ),
        ];
        for e in &r.index_errors {
            lines.push(format!("  ! {}", e));
        }
        for (project, orphans) in &r.orphans {
            lines.push(format!("  {}: {} orphaned reference(s)", project, orphans.total()));
            let all = orphans
                .parent_references
                .iter()
                .chain(&orphans.dependency_references)
                .chain(&orphans.sprint_references);
            for message in all {
                lines.push(format!("    - {}", message));
            }
        }
        lines.join("\n")
    }
}

pub fn system_health(storage: &Storage) -> Result<HealthResult> {
    let report = storage.health_check()?;
    Ok(HealthResult {
        healthy: report.is_healthy(),
        report,
    })
}

#[derive(Serialize)]
pub struct Reindexed {
    pub tasks: usize,
}

impl CommandResult for Reindexed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Rebuilt index with {} task(s)", self.tasks)
    }
}

/// Drop cached projects and rebuild the index from the files on disk.
pub fn system_reindex(storage: &Storage) -> Result<Reindexed> {
    storage.clear_cache();
    let tasks = storage.rebuild_index()?;
    Ok(Reindexed { tasks })
}

#[derive(Serialize)]
pub struct Compacted {
    pub removed: usize,
}

impl CommandResult for Compacted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Removed {} stale index entr{}", self.removed, if self.removed == 1 { "y" } else { "ies" })
    }
}

pub fn system_compact(storage: &Storage) -> Result<Compacted> {
    let removed = storage.compact_index()?;
    Ok(Compacted { removed })
}

#[derive(Serialize)]
pub struct Flushed {
    pub saved: usize,
}

impl CommandResult for Flushed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Saved {} project(s)", self.saved)
    }
}

pub fn system_flush(storage: &Storage) -> Result<Flushed> {
    let saved = storage.flush_all()?;
    Ok(Flushed { saved })
}

#[derive(Serialize)]
pub struct SystemStats {
    pub data_dir: PathBuf,
    pub projects: usize,
    pub tracking: bool,
    pub cache: CacheStats,
    pub index: IndexStats,
}

impl CommandResult for SystemStats {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Data directory: {}", self.data_dir.display()),
            format!("Projects: {}", self.projects),
            format!(
                "Cache: {} loaded, {} unsaved",
                self.cache.cached_projects, self.cache.dirty_projects
            ),
            format!(
                "Index: {} tasks ({} project-level, {} in modules)",
                self.index.total_entries, self.index.project_level, self.index.module_level
            ),
        ];
        for (project, count) in &self.index.per_project {
            lines.push(format!("  {}: {}", project, count));
        }
        lines.push(format!(
            "Tracking: {}",
            if self.tracking { "active" } else { "idle" }
        ));
        lines.join("\n")
    }
}

pub fn system_stats(storage: &Storage) -> Result<SystemStats> {
    Ok(SystemStats {
        data_dir: storage.paths().root().to_path_buf(),
        projects: storage.list_projects()?.len(),
        tracking: storage.is_tracking()?,
        cache: storage.cache_stats(),
        index: storage.index_stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewTask;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_reindex_picks_up_external_edits() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        let task = storage.add_task("web", None, NewTask::titled("A")).unwrap();
        storage.sync_index().unwrap();

        // Another process moves the project file away.
        std::fs::remove_file(env.paths().project_file("web")).unwrap();
        let result = system_reindex(&storage).unwrap();
        assert_eq!(result.tasks, 0);
        assert!(storage.lookup_task(&task.id).is_none());
    }

    #[test]
    fn test_health_human_lists_orphans() {
        let env = TestEnv::new();
        let storage = env.storage_with_project("web");
        storage
            .add_task(
                "web",
                None,
                NewTask {
                    parent_id: Some("deadbeef".into()),
                    ..NewTask::titled("A")
                },
            )
            .unwrap();

        let health = system_health(&storage).unwrap();
        assert!(!health.healthy);
        let text = health.to_human();
        assert!(text.contains("web: 1 orphaned reference(s)"));
        assert!(text.contains("references non-existent parent deadbeef"));
    }

    #[test]
    fn test_compact_message() {
        assert_eq!(Compacted { removed: 1 }.to_human(), "Removed 1 stale index entry");
        assert_eq!(Compacted { removed: 3 }.to_human(), "Removed 3 stale index entries");
    }
}
