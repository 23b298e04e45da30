use chrono::NaiveDate;
use serde::Serialize;

use super::{CommandResult, date_or_today, format_hours, json};
use crate::Result;
use crate::models::{CompletedSession, TrackingSession};
use crate::storage::{LoggedEntry, Storage, StoppedSession};

fn describe_stop(stopped: &StoppedSession) -> String {
    if stopped.logged {
        format!(
            "Stopped {} after {}, logged to {}",
            stopped.task_id,
            format_hours(stopped.hours),
            stopped.path
        )
    } else {
        format!("Stopped {} without logging time", stopped.task_id)
    }
}

#[derive(Serialize)]
pub struct TrackStarted {
    pub session: TrackingSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<StoppedSession>,
}

impl CommandResult for TrackStarted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let started = format!(
            "Tracking {} in {} since {}",
            self.session.task_id,
            self.session.path,
            self.session.start_time.format("%H:%M UTC")
        );
        match self.stopped {
            Some(ref stopped) => format!("{}\n{}", describe_stop(stopped), started),
            None => started,
        }
    }
}

/// Start a session. With `switch`, an active session is stopped first
/// instead of failing.
pub fn track_start(storage: &Storage, path: &str, task_id: &str, switch: bool) -> Result<TrackStarted> {
    if switch {
        return track_switch(storage, path, task_id);
    }
    let session = storage.start_tracking(path, task_id)?;
    Ok(TrackStarted {
        session,
        stopped: None,
    })
}

pub fn track_switch(storage: &Storage, path: &str, task_id: &str) -> Result<TrackStarted> {
    let (stopped, session) = storage.switch_tracking(path, task_id)?;
    Ok(TrackStarted { session, stopped })
}

#[derive(Serialize)]
pub struct TrackStopped {
    #[serde(flatten)]
    pub session: StoppedSession,
}

impl CommandResult for TrackStopped {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        describe_stop(&self.session)
    }
}

pub fn track_stop(storage: &Storage, discard: bool) -> Result<TrackStopped> {
    let session = if discard {
        storage.discard_tracking()?
    } else {
        storage.stop_tracking()?
    };
    Ok(TrackStopped { session })
}

#[derive(Serialize)]
pub struct TrackStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<TrackingSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_minutes: Option<i64>,
}

impl CommandResult for TrackStatus {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match (&self.session, self.elapsed_minutes) {
            (Some(s), Some(minutes)) => format!(
                "Tracking {} in {} for {}h {:02}m",
                s.task_id,
                s.path,
                minutes / 60,
                minutes % 60
            ),
            _ => "Not tracking.".to_string(),
        }
    }
}

pub fn track_status(storage: &Storage) -> Result<TrackStatus> {
    let session = storage.active_session()?;
    let elapsed_minutes = session
        .as_ref()
        .map(|s| (storage.clock().now() - s.start_time).num_minutes().max(0));
    Ok(TrackStatus {
        active: session.is_some(),
        session,
        elapsed_minutes,
    })
}

#[derive(Serialize)]
pub struct TrackLog {
    pub date: NaiveDate,
    pub entries: Vec<LoggedEntry>,
    pub total_hours: f64,
}

impl CommandResult for TrackLog {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return format!("No time logged on {}.", self.date);
        }
        let mut lines = vec![format!("Time logged on {}:", self.date)];
        for e in &self.entries {
            lines.push(format!(
                "  {} {} {} {}",
                format_hours(e.entry.hours),
                e.project,
                e.task_id,
                e.task_title
            ));
        }
        lines.push(format!("Total: {}", format_hours(self.total_hours)));
        lines.join("\n")
    }
}

pub fn track_log(storage: &Storage, date: Option<&str>) -> Result<TrackLog> {
    let date = date_or_today(storage, date)?;
    let entries = storage.time_entries_for_date(date)?;
    let total_hours = entries.iter().map(|e| e.entry.hours).fold(0.0, |acc, h| acc + h);
    Ok(TrackLog {
        date,
        entries,
        total_hours,
    })
}

#[derive(Serialize)]
pub struct SessionList {
    pub sessions: Vec<CompletedSession>,
    pub count: usize,
    pub total_hours: f64,
}

impl CommandResult for SessionList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No completed sessions.".to_string();
        }
        let mut lines = vec![format!("{} session(s):", self.count)];
        for s in &self.sessions {
            lines.push(format!(
                "  {} {} {} {}",
                s.start.format("%Y-%m-%d %H:%M"),
                format_hours(s.hours),
                s.path,
                s.task_id
            ));
        }
        lines.push(format!("Total: {}", format_hours(self.total_hours)));
        lines.join("\n")
    }
}

pub fn track_list(storage: &Storage) -> Result<SessionList> {
    let sessions = storage.completed_sessions()?;
    let total_hours = sessions.iter().map(|s| s.hours).fold(0.0, |acc, h| acc + h);
    Ok(SessionList {
        count: sessions.len(),
        sessions,
        total_hours,
    })
}
