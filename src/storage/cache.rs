//! In-memory project cache with dirty tracking.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::Project;

#[derive(Debug, Default)]
struct CacheState {
    projects: HashMap<String, Project>,
    dirty: HashSet<String>,
}

/// Counts reported by health checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached_projects: usize,
    pub dirty_projects: usize,
}

/// Loaded project documents keyed by name, plus the set of names whose
/// in-memory document has not been persisted yet.
#[derive(Debug, Default)]
pub struct ProjectCache {
    inner: RwLock<CacheState>,
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the cached document, if loaded.
    pub fn get(&self, name: &str) -> Option<Project> {
        self.read().projects.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().projects.contains_key(name)
    }

    /// Insert or replace the cached document.
    pub fn put(&self, name: &str, project: Project) {
        self.write().projects.insert(name.to_string(), project);
    }

    pub fn mark_dirty(&self, name: &str) {
        self.write().dirty.insert(name.to_string());
    }

    pub fn clear_dirty(&self, name: &str) {
        self.write().dirty.remove(name);
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.read().dirty.contains(name)
    }

    /// Evict a project. Any unsaved changes are discarded.
    pub fn invalidate(&self, name: &str) {
        let mut state = self.write();
        state.projects.remove(name);
        state.dirty.remove(name);
    }

    /// Evict everything.
    pub fn clear(&self) {
        let mut state = self.write();
        state.projects.clear();
        state.dirty.clear();
    }

    /// Dirty project names, sorted.
    pub fn dirty_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().dirty.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        CacheStats {
            cached_projects: state.projects.len(),
            dirty_projects: state.dirty.len(),
        }
    }
}
