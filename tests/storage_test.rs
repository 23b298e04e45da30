//! Library-level tests for the storage core.
//!
//! These drive `Storage` directly with a mock clock, covering the document
//! invariants and the end-to-end flows a command would go through.

use chrono::{Days, Duration};
use qix::Error;
use qix::clock::{Clock, MockClock};
use qix::config::DataPaths;
use qix::models::{Project, TaskStatus};
use qix::storage::{NewTask, Storage, codec};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    clock: Arc<MockClock>,
    storage: Storage,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::fixed());
        let storage = Storage::open_with_clock(DataPaths::new(dir.path()), clock.clone()).unwrap();
        Self {
            dir,
            clock,
            storage,
        }
    }

    fn reopen(&self) -> Storage {
        Storage::open_with_clock(DataPaths::new(self.dir.path()), self.clock.clone()).unwrap()
    }
}

fn assert_single_container(project: &Project) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for task in &project.tasks {
        *seen.entry(task.id.as_str()).or_default() += 1;
    }
    for module in &project.modules {
        for task in &module.tasks {
            *seen.entry(task.id.as_str()).or_default() += 1;
        }
    }
    for (id, count) in seen {
        assert_eq!(count, 1, "task {} stored {} times", id, count);
    }
}

#[test]
fn test_scenario_create_and_find() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let task = fx
        .storage
        .add_task("demo", None, NewTask::titled("Build X"))
        .unwrap();

    assert_eq!(task.id.len(), 8);
    assert!(task.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let (found, location) = fx.storage.find_task("demo", &task.id).unwrap();
    assert_eq!(found.status, TaskStatus::Todo);
    assert_eq!(found.priority, qix::models::Priority::Medium);
    assert_eq!(location, "project");

    // A second process sees the same document.
    let (reloaded, _) = fx.reopen().find_task("demo", &task.id).unwrap();
    assert_eq!(reloaded, found);
}

#[test]
fn test_scenario_track_time() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let task = fx
        .storage
        .add_task("demo", None, NewTask::titled("Build X"))
        .unwrap();

    fx.storage.start_tracking("demo", &task.id).unwrap();
    assert!(fx.storage.is_tracking().unwrap());
    fx.clock.advance(Duration::minutes(90));
    let stopped = fx.storage.stop_tracking().unwrap();

    assert!((stopped.hours - 1.5).abs() < 1e-9);
    assert!(!fx.storage.is_tracking().unwrap());
    let (task, _) = fx.storage.find_task("demo", &task.id).unwrap();
    assert!((task.actual_hours() - 1.5).abs() < 1e-9);
}

#[test]
fn test_scenario_recurring_completion() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let task = fx
        .storage
        .add_task("demo", None, NewTask::titled("Water plants"))
        .unwrap();
    fx.storage
        .set_task_recurrence("demo", &task.id, "interval:3")
        .unwrap();

    let done = fx.storage.complete_task("demo", &task.id).unwrap();
    let today = fx.clock.today();
    let recurrence = done.recurrence.unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(recurrence.last_completed, Some(today));
    assert_eq!(recurrence.next_due, today.checked_add_days(Days::new(3)).unwrap());
}

#[test]
fn test_scenario_dependencies() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let a = fx.storage.add_task("demo", None, NewTask::titled("A")).unwrap();
    let b = fx.storage.add_task("demo", None, NewTask::titled("B")).unwrap();

    fx.storage.add_task_dependency("demo", &a.id, &b.id).unwrap();
    // Two-task cycles are accepted.
    fx.storage.add_task_dependency("demo", &b.id, &a.id).unwrap();
    assert!(matches!(
        fx.storage.add_task_dependency("demo", &a.id, &a.id),
        Err(Error::InvalidReference(_))
    ));
}

#[test]
fn test_derived_hours_match_entries() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let task = fx.storage.add_task("demo", None, NewTask::titled("A")).unwrap();
    let today = fx.clock.today();

    for hours in [0.25, 1.0, 2.75] {
        let updated = fx
            .storage
            .add_time_entry("demo", &task.id, today, hours)
            .unwrap();
        let sum: f64 = updated.time_entries.iter().map(|e| e.hours).sum();
        assert_eq!(updated.actual_hours(), sum);
    }
    assert_eq!(fx.storage.total_hours_for_date(today).unwrap(), 4.0);
}

#[test]
fn test_every_task_has_exactly_one_container() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    fx.storage.add_module("demo", "api", "", Vec::new()).unwrap();
    fx.storage.add_module("demo", "ui", "", Vec::new()).unwrap();
    for (module, title) in [(None, "A"), (Some("api"), "B"), (Some("ui"), "C"), (None, "D")] {
        fx.storage.add_task("demo", module, NewTask::titled(title)).unwrap();
    }
    let removed = fx.storage.add_task("demo", Some("api"), NewTask::titled("E")).unwrap();
    fx.storage.remove_task("demo", &removed.id).unwrap();

    let project = fx.reopen().load_project("demo").unwrap();
    assert_eq!(project.all_tasks().count(), 4);
    assert_single_container(&project);
}

#[test]
fn test_rebuild_twice_is_bit_identical() {
    let fx = Fixture::new();
    for name in ["alpha", "beta"] {
        fx.storage.create_project(name, "", Vec::new()).unwrap();
        fx.storage.add_module(name, "core", "", Vec::new()).unwrap();
        fx.storage.add_task(name, None, NewTask::titled("A")).unwrap();
        fx.storage.add_task(name, Some("core"), NewTask::titled("B")).unwrap();
    }
    let index_file = fx.dir.path().join("index.json");

    assert_eq!(fx.storage.rebuild_index().unwrap(), 4);
    let first = fs::read(&index_file).unwrap();
    assert_eq!(fx.storage.rebuild_index().unwrap(), 4);
    let second = fs::read(&index_file).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_successful_update_leaves_project_clean() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();

    fx.storage
        .update_project("demo", |p| {
            p.description = "updated".to_string();
            Ok(())
        })
        .unwrap();

    assert!(!fx.storage.is_dirty("demo"));
    let cached = fx.storage.load_project("demo").unwrap();
    let on_disk: Project = codec::read_document(&fx.dir.path().join("projects/demo.json")).unwrap();
    assert_eq!(cached, on_disk);
    assert_eq!(on_disk.description, "updated");
}

#[test]
fn test_failed_mutator_changes_nothing() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "before", Vec::new()).unwrap();
    let path = fx.dir.path().join("projects/demo.json");
    let before = fs::read(&path).unwrap();

    let result: qix::Result<()> = fx.storage.update_project("demo", |p| {
        p.description = "half-done".to_string();
        Err(Error::ValidationFailed("nope".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fx.storage.load_project("demo").unwrap().description, "before");
    assert!(!fx.storage.is_dirty("demo"));
}

#[test]
fn test_orphaned_parent_reported_until_parent_exists() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let child = fx
        .storage
        .add_task(
            "demo",
            None,
            NewTask {
                parent_id: Some("nonexistent".to_string()),
                ..NewTask::titled("Child")
            },
        )
        .unwrap();

    let report = fx.storage.find_orphaned_references("demo").unwrap();
    assert_eq!(report.parent_references.len(), 1);

    let parent = fx.storage.add_task("demo", None, NewTask::titled("Parent")).unwrap();
    fx.storage
        .link_task_as_child("demo", &child.id, &parent.id)
        .unwrap();
    assert!(fx.storage.find_orphaned_references("demo").unwrap().is_empty());
}

#[test]
fn test_index_survives_restart_and_detects_staleness() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    let task = fx.storage.add_task("demo", None, NewTask::titled("A")).unwrap();
    fx.storage.sync_index().unwrap();

    let reopened = fx.reopen();
    assert_eq!(reopened.lookup_task(&task.id).unwrap().project, "demo");
    assert!(!reopened.is_index_stale().unwrap());

    fs::remove_file(fx.dir.path().join("index.json")).unwrap();
    let reopened = fx.reopen();
    assert!(reopened.is_index_stale().unwrap());
    assert!(reopened.ensure_index_fresh().unwrap());
    assert!(reopened.lookup_task(&task.id).is_some());
}

#[test]
fn test_flush_all_persists_staged_projects() {
    let fx = Fixture::new();
    fx.storage.create_project("demo", "", Vec::new()).unwrap();
    fx.storage
        .stage_project("demo", |p| {
            p.description = "staged".to_string();
            Ok(())
        })
        .unwrap();
    assert!(fx.storage.is_dirty("demo"));
    assert_eq!(fx.reopen().load_project("demo").unwrap().description, "");

    assert_eq!(fx.storage.flush_all().unwrap(), 1);
    assert!(!fx.storage.is_dirty("demo"));
    assert_eq!(fx.reopen().load_project("demo").unwrap().description, "staged");
}
