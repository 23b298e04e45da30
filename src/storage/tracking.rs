//! Time tracking sessions.
//!
//! At most one session is active at a time. Stopping it logs the elapsed
//! time as a [`TimeEntry`] on the tracked task, dated with the calendar day
//! the session stopped.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::{Storage, codec};
use crate::models::{CompletedSession, TimeEntry, TrackingData, TrackingSession, split_path};
use crate::{Error, Result};

/// Result of stopping a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoppedSession {
    pub path: String,
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: f64,
    /// False when the session was too short to log, or was discarded
    pub logged: bool,
}

/// A time entry together with the task it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedEntry {
    pub project: String,
    pub task_id: String,
    pub task_title: String,
    #[serde(flatten)]
    pub entry: TimeEntry,
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = end - start;
    (elapsed.num_milliseconds().max(0) as f64) / 3_600_000.0
}

impl Storage {
    pub fn load_tracking(&self) -> Result<TrackingData> {
        match codec::read_document(&self.paths.tracking_file()) {
            Ok(data) => Ok(data),
            Err(Error::MissingDocument(_)) => Ok(TrackingData::default()),
            Err(e) => Err(e),
        }
    }

    fn save_tracking(&self, data: &TrackingData) -> Result<()> {
        codec::write_document(&self.paths.tracking_file(), data)
    }

    /// Check that `path` ("project" or "project/module") holds `task_id`.
    /// Returns the normalized path.
    fn resolve_tracking_target(&self, path: &str, task_id: &str) -> Result<String> {
        let (project, module) = split_path(path);
        match module {
            Some(module) => {
                let m = self.get_module(project, module)?;
                if !m.tasks.iter().any(|t| t.id == task_id) {
                    return Err(Error::TaskNotFound {
                        project: path.to_string(),
                        task_id: task_id.to_string(),
                    });
                }
                Ok(format!("{}/{}", project, module))
            }
            None => {
                self.find_task(project, task_id)?;
                Ok(project.to_string())
            }
        }
    }

    /// Start tracking a task. Fails if a session is already running.
    pub fn start_tracking(&self, path: &str, task_id: &str) -> Result<TrackingSession> {
        let mut data = self.load_tracking()?;
        if let Some(ref active) = data.active_session {
            return Err(Error::SessionActive(active.task_id.clone()));
        }

        let path = self.resolve_tracking_target(path, task_id)?;
        let session = TrackingSession {
            path,
            task_id: task_id.to_string(),
            start_time: self.clock.now(),
        };
        data.active_session = Some(session.clone());
        self.save_tracking(&data)?;
        tracing::info!(path = %session.path, task = task_id, "started tracking");
        Ok(session)
    }

    /// Stop the active session and log its time on the task.
    ///
    /// If logging fails the session stays active.
    pub fn stop_tracking(&self) -> Result<StoppedSession> {
        self.finish_session(true)
    }

    /// Stop the active session without logging any time.
    pub fn discard_tracking(&self) -> Result<StoppedSession> {
        self.finish_session(false)
    }

    fn finish_session(&self, log_time: bool) -> Result<StoppedSession> {
        let mut data = self.load_tracking()?;
        let session = data.active_session.clone().ok_or(Error::NoActiveSession)?;

        let end = self.clock.now();
        let hours = hours_between(session.start_time, end);
        let logged = log_time && hours > 0.0;

        // Close the session on disk first; reopen it if logging fails.
        let previous = data.clone();
        data.active_session = None;
        if logged {
            data.sessions.push(CompletedSession {
                path: session.path.clone(),
                task_id: session.task_id.clone(),
                start: session.start_time,
                end,
                hours,
            });
        }
        self.save_tracking(&data)?;

        if logged {
            let today = self.clock.today();
            if let Err(e) = self.add_time_entry(session.project(), &session.task_id, today, hours) {
                if let Err(restore) = self.save_tracking(&previous) {
                    tracing::error!(error = %restore, "failed to restore tracking session");
                }
                return Err(e);
            }
        }
        tracing::info!(task = %session.task_id, hours, logged, "stopped tracking");

        Ok(StoppedSession {
            path: session.path,
            task_id: session.task_id,
            start: session.start_time,
            end,
            hours,
            logged,
        })
    }

    /// Stop the active session (if any) and start tracking another task.
    /// The new target is checked before anything is stopped.
    pub fn switch_tracking(
        &self,
        path: &str,
        task_id: &str,
    ) -> Result<(Option<StoppedSession>, TrackingSession)> {
        self.resolve_tracking_target(path, task_id)?;
        let stopped = if self.is_tracking()? {
            Some(self.stop_tracking()?)
        } else {
            None
        };
        let started = self.start_tracking(path, task_id)?;
        Ok((stopped, started))
    }

    pub fn active_session(&self) -> Result<Option<TrackingSession>> {
        Ok(self.load_tracking()?.active_session)
    }

    pub fn is_tracking(&self) -> Result<bool> {
        Ok(self.active_session()?.is_some())
    }

    /// Time since the active session started.
    pub fn elapsed_time(&self) -> Result<Option<Duration>> {
        let now = self.clock.now();
        Ok(self.active_session()?.map(|s| now - s.start_time))
    }

    pub fn completed_sessions(&self) -> Result<Vec<CompletedSession>> {
        Ok(self.load_tracking()?.sessions)
    }

    /// Point tracking data at a renamed project.
    pub(crate) fn rename_tracked_project(&self, old: &str, new: &str) -> Result<()> {
        let mut data = self.load_tracking()?;
        let rename = |path: &mut String| -> bool {
            let (project, module) = split_path(path);
            if project != old {
                return false;
            }
            let renamed = match module {
                Some(module) => format!("{}/{}", new, module),
                None => new.to_string(),
            };
            *path = renamed;
            true
        };

        let mut changed = false;
        if let Some(ref mut session) = data.active_session {
            changed |= rename(&mut session.path);
        }
        for session in &mut data.sessions {
            changed |= rename(&mut session.path);
        }
        if changed {
            self.save_tracking(&data)?;
        }
        Ok(())
    }

    // === Time entry queries ===

    /// Time entries in every project whose date falls in `start..=end`.
    pub fn time_entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<LoggedEntry>> {
        let mut entries = Vec::new();
        for p in self.all_projects()? {
            for task in p.all_tasks() {
                for entry in &task.time_entries {
                    if entry.date >= start && entry.date <= end {
                        entries.push(LoggedEntry {
                            project: p.name.clone(),
                            task_id: task.id.clone(),
                            task_title: task.title.clone(),
                            entry: entry.clone(),
                        });
                    }
                }
            }
        }
        entries.sort_by(|a, b| {
            a.entry
                .date
                .cmp(&b.entry.date)
                .then(a.entry.logged_at.cmp(&b.entry.logged_at))
        });
        Ok(entries)
    }

    pub fn time_entries_for_date(&self, date: NaiveDate) -> Result<Vec<LoggedEntry>> {
        self.time_entries_in_range(date, date)
    }

    pub fn total_hours_for_date(&self, date: NaiveDate) -> Result<f64> {
        Ok(self
            .time_entries_for_date(date)?
            .iter()
            .map(|e| e.entry.hours)
            .fold(0.0, |acc, h| acc + h))
    }
}
