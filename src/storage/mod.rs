//! Storage layer for qix data.
//!
//! This module handles persistence of projects and time tracking.
//!
//! ## Layout
//!
//! - `projects/<name>.json` - one document per project, written atomically
//! - `index.json` - snapshot of the task ID index
//! - `tracking.json` - active tracking session and session history
//!
//! ## Write path
//!
//! Every change to a project goes through [`Storage::update_project`]: the
//! document is loaded (from the cache or disk), a mutator closure runs on a
//! working copy, and on success the copy is cached, written, and re-indexed.
//! A mutator error leaves cache and disk exactly as they were.

pub mod cache;
pub mod codec;
pub mod health;
pub mod index;
pub mod project;
pub mod task;
pub mod tracking;

pub use cache::{CacheStats, ProjectCache};
pub use health::{HealthReport, OrphanReport};
pub use index::{IndexStats, TaskIndex};
pub use project::ModuleEdit;
pub use task::{NewTask, TaskEdit};
pub use tracking::{LoggedEntry, StoppedSession};

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::clock::{Clock, SystemClock};
use crate::config::DataPaths;
use crate::models::{Priority, Project, Task, TaskLocation, TaskStatus};
use crate::{Error, Result};

/// Storage context for one data directory.
///
/// Constructed once per process and passed to every command.
pub struct Storage {
    paths: DataPaths,
    cache: ProjectCache,
    index: TaskIndex,
    clock: Arc<dyn Clock>,
}

impl Storage {
    /// Open storage using the wall clock.
    pub fn open(paths: DataPaths) -> Result<Self> {
        Self::open_with_clock(paths, Arc::new(SystemClock))
    }

    /// Open storage with an explicit time source, creating the directory
    /// layout if needed and loading the index snapshot.
    pub fn open_with_clock(paths: DataPaths, clock: Arc<dyn Clock>) -> Result<Self> {
        paths.ensure_dirs()?;
        let index = TaskIndex::open(paths.index_file())?;
        Ok(Self {
            paths,
            cache: ProjectCache::new(),
            index,
            clock,
        })
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn index(&self) -> &TaskIndex {
        &self.index
    }

    // === Project documents ===

    /// Load a project from the cache, or from disk on a miss.
    pub fn load_project(&self, name: &str) -> Result<Project> {
        validate_name("Project", name)?;
        if let Some(project) = self.cache.get(name) {
            return Ok(project);
        }

        let path = self.paths.project_file(name);
        let project: Project = match codec::read_document(&path) {
            Ok(project) => project,
            Err(Error::MissingDocument(_)) => return Err(Error::ProjectNotFound(name.to_string())),
            Err(e) => return Err(e),
        };
        tracing::debug!(project = name, "loaded project from disk");

        self.cache.put(name, project.clone());
        Ok(project)
    }

    /// Cache, write and re-index a project document.
    ///
    /// The project is marked dirty before the write and stays dirty if the
    /// write fails, so [`Storage::flush_all`] can retry it.
    pub fn save_project(&self, project: &Project) -> Result<()> {
        validate_name("Project", &project.name)?;
        self.cache.put(&project.name, project.clone());
        self.cache.mark_dirty(&project.name);
        self.persist(project)
    }

    fn persist(&self, project: &Project) -> Result<()> {
        codec::write_document(&self.paths.project_file(&project.name), project)?;
        self.cache.clear_dirty(&project.name);
        self.index.reindex_project(project);
        tracing::debug!(project = %project.name, "saved project");
        Ok(())
    }

    /// Load a project, apply `mutator` to a working copy and persist it.
    ///
    /// If the mutator fails nothing is written and the cached document is
    /// left as it was.
    pub fn update_project<R, F>(&self, name: &str, mutator: F) -> Result<R>
    where
        F: FnOnce(&mut Project) -> Result<R>,
    {
        let mut working = self.load_project(name)?;
        let out = mutator(&mut working)?;
        ensure_same_name(name, &working)?;
        self.save_project(&working)?;
        Ok(out)
    }

    /// Apply `mutator` in memory only and mark the project dirty.
    /// The change is written by the next [`Storage::flush_all`].
    pub fn stage_project<R, F>(&self, name: &str, mutator: F) -> Result<R>
    where
        F: FnOnce(&mut Project) -> Result<R>,
    {
        let mut working = self.load_project(name)?;
        let out = mutator(&mut working)?;
        ensure_same_name(name, &working)?;
        self.cache.put(name, working);
        self.cache.mark_dirty(name);
        Ok(out)
    }

    /// Persist every dirty project.
    ///
    /// Every dirty project is attempted; failures are collected into a single
    /// [`Error::FlushFailed`]. Returns the number of projects written.
    pub fn flush_all(&self) -> Result<usize> {
        let mut saved = 0;
        let mut failures = Vec::new();

        for name in self.cache.dirty_names() {
            let Some(project) = self.cache.get(&name) else {
                self.cache.clear_dirty(&name);
                continue;
            };
            match self.persist(&project) {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::error!(project = %name, error = %e, "failed to flush project");
                    failures.push((name, e.to_string()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::FlushFailed { failures });
        }
        self.index.sync()?;
        Ok(saved)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.cache.is_dirty(name)
    }

    /// Drop every cached document. Unflushed changes are lost.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Names of all projects on disk, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        let dir = self.paths.projects_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::IoAt { path: dir, source }),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    let name = stem.to_string_lossy().into_owned();
                    if validate_name("Project", &name).is_ok() {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn project_exists(&self, name: &str) -> bool {
        if validate_name("Project", name).is_err() {
            return false;
        }
        self.cache.contains(name) || self.paths.project_file(name).is_file()
    }

    /// Every readable project. Corrupted documents are logged and skipped.
    pub fn all_projects(&self) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        for name in self.list_projects()? {
            match self.load_project(&name) {
                Ok(project) => projects.push(project),
                Err(e @ Error::Corrupted { .. }) => {
                    tracing::warn!(project = %name, error = %e, "skipping unreadable project");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(projects)
    }

    // === Task index ===

    /// Recompute the index from every project and write the snapshot.
    /// Returns the number of indexed tasks.
    pub fn rebuild_index(&self) -> Result<usize> {
        let projects = self.all_projects()?;
        let entries = index::build_index(&projects);
        let count = entries.len();
        self.index.replace(entries)?;
        tracing::info!(projects = projects.len(), tasks = count, "rebuilt task index");
        Ok(count)
    }

    /// Wait for background snapshot writes to finish.
    pub fn sync_index(&self) -> Result<()> {
        self.index.sync()
    }

    /// Whether the snapshot is missing or older than any project file.
    ///
    /// Relies on modification times, so edits within the filesystem's
    /// timestamp granularity go unnoticed.
    pub fn is_index_stale(&self) -> Result<bool> {
        if let Err(e) = self.index.sync() {
            tracing::warn!(error = %e, "index snapshot write failed");
        }

        let Some(snapshot_time) = modified_time(&self.paths.index_file())? else {
            return Ok(true);
        };
        for name in self.list_projects()? {
            if let Some(project_time) = modified_time(&self.paths.project_file(&name))? {
                if project_time > snapshot_time {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Rebuild the index if it is stale. Returns whether a rebuild happened.
    pub fn ensure_index_fresh(&self) -> Result<bool> {
        if !self.is_index_stale()? {
            return Ok(false);
        }
        tracing::info!("task index is stale, rebuilding");
        self.rebuild_index()?;
        Ok(true)
    }

    /// Where the index says a task lives. May be stale.
    pub fn lookup_task(&self, task_id: &str) -> Option<TaskLocation> {
        self.index.lookup(task_id)
    }

    /// Find a task in any project.
    ///
    /// The index entry is confirmed against the project document. When the
    /// index is wrong every project is scanned and the holder is re-indexed.
    pub fn locate_task(&self, task_id: &str) -> Result<(Task, TaskLocation)> {
        if let Some(hint) = self.index.lookup(task_id) {
            match self.load_project(&hint.project) {
                Ok(project) => {
                    if let Some((task, location)) = project.find_task(task_id) {
                        return Ok((task.clone(), TaskLocation::new(&project.name, location)));
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(e @ Error::Corrupted { .. }) => {
                    tracing::warn!(project = %hint.project, error = %e, "index points at unreadable project");
                }
                Err(e) => return Err(e),
            }
            tracing::debug!(task = task_id, "index entry is stale, scanning projects");
        }

        for project in self.all_projects()? {
            if let Some((task, location)) = project.find_task(task_id) {
                let found = (task.clone(), TaskLocation::new(&project.name, location));
                self.index.reindex_project(&project);
                return Ok(found);
            }
        }
        Err(Error::NotFound(format!("Task '{}'", task_id)))
    }

    /// Drop index entries whose project no longer exists on disk.
    /// Returns the number of entries removed.
    pub fn compact_index(&self) -> Result<usize> {
        let existing: HashSet<String> = self.list_projects()?.into_iter().collect();
        let removed = self.index.retain(|_, loc| existing.contains(&loc.project))?;
        tracing::info!(removed, "compacted task index");
        Ok(removed)
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    // === Identifiers ===

    /// A fresh task ID unused in `project` and in the index.
    pub(crate) fn new_task_id(&self, project: &Project, seed: &str) -> String {
        loop {
            let id = generate_id(seed, self.clock.now());
            if !project.contains_task(&id) && !self.index.contains(&id) {
                return id;
            }
        }
    }
}

fn ensure_same_name(name: &str, project: &Project) -> Result<()> {
    if project.name != name {
        return Err(Error::ValidationFailed(format!(
            "project '{}' cannot be renamed by an update",
            name
        )));
    }
    Ok(())
}

fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::IoAt {
            path: path.to_path_buf(),
            source,
        }),
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a task ID.
///
/// Format: 8 lowercase hex characters taken from a SHA-256 over the seed,
/// the timestamp, the process ID and a per-process counter.
pub fn generate_id(seed: &str, now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    hash_hex[..8].to_string()
}

/// Validate that a task ID has the expected format.
pub fn validate_task_id(id: &str) -> Result<()> {
    if id.len() != 8 || !id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
        return Err(Error::ValidationFailed(format!(
            "Task ID must be 8 lowercase hex characters, got: {}",
            id
        )));
    }
    Ok(())
}

/// Validate a project or module name.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationFailed(format!("{} name cannot be empty", kind)));
    }
    if trimmed != name || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(Error::ValidationFailed(format!(
            "Invalid {} name: {:?}",
            kind.to_lowercase(),
            name
        )));
    }
    Ok(())
}

/// Parse a status string into TaskStatus.
pub fn parse_status(s: &str) -> Result<TaskStatus> {
    TaskStatus::parse(s).ok_or_else(|| {
        Error::ValidationFailed(format!(
            "Invalid status: {} (use: todo, doing, done, blocked)",
            s
        ))
    })
}

/// Parse a priority string into Priority.
pub fn parse_priority(s: &str) -> Result<Priority> {
    Priority::parse(s).ok_or_else(|| {
        Error::ValidationFailed(format!("Invalid priority: {} (use: low, medium, high)", s))
    })
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::ValidationFailed(format!("Invalid date: {} (use YYYY-MM-DD)", s)))
}
