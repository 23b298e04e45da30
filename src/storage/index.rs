//! Cross-project task index.
//!
//! Maps every task ID to the project and container holding it. The index is
//! derived data: it can always be rebuilt from the project documents. The
//! in-memory map is updated synchronously, while the on-disk snapshot is
//! written by a dedicated worker thread that only ever keeps the most recent
//! pending snapshot.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::models::{MODULE_LOCATION_PREFIX, PROJECT_LOCATION, Project, TaskIndexMap, TaskLocation};
use crate::storage::codec;
use crate::{Error, Result};

/// Index entries for every task in `project`.
pub fn project_entries(project: &Project) -> impl Iterator<Item = (String, TaskLocation)> + '_ {
    project
        .tasks_with_location()
        .map(move |(task, location)| (task.id.clone(), TaskLocation::new(&project.name, location)))
}

/// Build a complete index from a set of projects.
pub fn build_index<'a>(projects: impl IntoIterator<Item = &'a Project>) -> TaskIndexMap {
    projects.into_iter().flat_map(|p| project_entries(p)).collect()
}

/// Summary of the index contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_entries: usize,
    pub project_level: usize,
    pub module_level: usize,
    pub per_project: BTreeMap<String, usize>,
}

/// In-memory task index backed by a snapshot file.
pub struct TaskIndex {
    entries: RwLock<TaskIndexMap>,
    snapshot_path: PathBuf,
    writer: SnapshotWriter,
}

impl TaskIndex {
    /// Load the snapshot at `snapshot_path`, starting empty if it is missing
    /// or unreadable.
    pub fn open(snapshot_path: PathBuf) -> Result<Self> {
        let entries = match codec::read_document::<TaskIndexMap>(&snapshot_path) {
            Ok(entries) => entries,
            Err(Error::MissingDocument(_)) => {
                tracing::debug!(path = %snapshot_path.display(), "no index snapshot, starting empty");
                TaskIndexMap::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable index snapshot");
                TaskIndexMap::new()
            }
        };
        let writer = SnapshotWriter::spawn(snapshot_path.clone())?;
        Ok(Self {
            entries: RwLock::new(entries),
            snapshot_path,
            writer,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Location of a task according to the index. May be stale.
    pub fn lookup(&self, task_id: &str) -> Option<TaskLocation> {
        self.read().get(task_id).cloned()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.read().contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// A copy of the whole map.
    pub fn snapshot(&self) -> TaskIndexMap {
        self.read().clone()
    }

    /// Replace the whole map and write the snapshot before returning.
    pub fn replace(&self, entries: TaskIndexMap) -> Result<()> {
        {
            let mut guard = self.write();
            *guard = entries;
            self.writer.submit(guard.clone());
        }
        self.writer.flush()
    }

    /// Swap the entries for one project with those of `project`.
    /// The snapshot is written in the background.
    pub fn reindex_project(&self, project: &Project) {
        let mut guard = self.write();
        guard.retain(|_, loc| loc.project != project.name);
        guard.extend(project_entries(project));
        self.writer.submit(guard.clone());
    }

    /// Drop every entry for `name`. The snapshot is written in the background.
    pub fn remove_project(&self, name: &str) {
        let mut guard = self.write();
        guard.retain(|_, loc| loc.project != name);
        self.writer.submit(guard.clone());
    }

    /// Keep only the entries matching `keep`, persist, and return how many were dropped.
    pub fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&str, &TaskLocation) -> bool,
    {
        let removed = {
            let mut guard = self.write();
            let before = guard.len();
            guard.retain(|id, loc| keep(id, loc));
            let removed = before - guard.len();
            self.writer.submit(guard.clone());
            removed
        };
        self.writer.flush()?;
        Ok(removed)
    }

    /// Block until pending snapshot writes finish.
    pub fn sync(&self) -> Result<()> {
        self.writer.flush()
    }

    pub fn stats(&self) -> IndexStats {
        let guard = self.read();
        let mut stats = IndexStats {
            total_entries: guard.len(),
            ..Default::default()
        };
        for loc in guard.values() {
            *stats.per_project.entry(loc.project.clone()).or_default() += 1;
            if loc.location == PROJECT_LOCATION {
                stats.project_level += 1;
            } else if loc.location.starts_with(MODULE_LOCATION_PREFIX) {
                stats.module_level += 1;
            }
        }
        stats
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TaskIndexMap> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TaskIndexMap> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct WriterState {
    pending: Option<TaskIndexMap>,
    in_flight: bool,
    shutdown: bool,
    last_error: Option<Error>,
}

struct WriterShared {
    state: Mutex<WriterState>,
    cv: Condvar,
}

impl WriterShared {
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, WriterState>) -> MutexGuard<'a, WriterState> {
        self.cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-slot background writer: a newer snapshot replaces one still waiting.
struct SnapshotWriter {
    shared: Arc<WriterShared>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    fn spawn(path: PathBuf) -> Result<Self> {
        let shared = Arc::new(WriterShared {
            state: Mutex::new(WriterState::default()),
            cv: Condvar::new(),
        });

        let handle = thread::Builder::new()
            .name("qix-index-writer".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || Self::run(shared, path)
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    fn submit(&self, entries: TaskIndexMap) {
        let mut state = self.shared.lock();
        state.pending = Some(entries);
        self.shared.cv.notify_all();
    }

    /// Wait until nothing is pending or in flight, then report the most
    /// recent write failure, if any.
    fn flush(&self) -> Result<()> {
        let mut state = self.shared.lock();
        while state.pending.is_some() || state.in_flight {
            state = self.shared.wait(state);
        }
        match state.last_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run(shared: Arc<WriterShared>, path: PathBuf) {
        loop {
            let entries = {
                let mut state = shared.lock();
                loop {
                    if let Some(entries) = state.pending.take() {
                        state.in_flight = true;
                        break entries;
                    }
                    if state.shutdown {
                        return;
                    }
                    state = shared.wait(state);
                }
            };

            let result = codec::write_document(&path, &entries);

            let mut state = shared.lock();
            state.in_flight = false;
            match result {
                Ok(()) => {
                    tracing::debug!(entries = entries.len(), "index snapshot written");
                    state.last_error = None;
                }
                Err(e) => {
                    tracing::error!(error = %e, path = %path.display(), "index snapshot write failed");
                    state.last_error = Some(e);
                }
            }
            shared.cv.notify_all();
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            self.shared.cv.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
