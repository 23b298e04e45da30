//! Recurring task schedules.
//!
//! Patterns are written as `daily`, `weekly:<weekday>`, `monthly:<1-31>` or
//! `interval:<days>`.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// How often a task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Interval,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceKind::Daily => "daily",
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::Monthly => "monthly",
            RecurrenceKind::Interval => "interval",
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence configuration of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,

    /// Weekday name, day of month, or interval in days
    #[serde(default)]
    pub value: String,

    pub next_due: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<NaiveDate>,

    pub enabled: bool,
}

impl Recurrence {
    /// Parse a pattern and schedule the first occurrence after `today`.
    pub fn parse(pattern: &str, today: NaiveDate) -> Result<Self> {
        let (kind, value) = match pattern.split_once(':') {
            Some((kind, value)) => (kind, value.trim()),
            None => (pattern, ""),
        };

        let kind = match kind.trim().to_lowercase().as_str() {
            "daily" => RecurrenceKind::Daily,
            "weekly" => {
                if value.is_empty() {
                    return Err(Error::ValidationFailed(
                        "weekly pattern requires day (e.g., weekly:monday)".to_string(),
                    ));
                }
                parse_weekday(value)?;
                RecurrenceKind::Weekly
            }
            "monthly" => {
                if value.is_empty() {
                    return Err(Error::ValidationFailed(
                        "monthly pattern requires day number (e.g., monthly:15)".to_string(),
                    ));
                }
                match value.parse::<u32>() {
                    Ok(day) if (1..=31).contains(&day) => RecurrenceKind::Monthly,
                    _ => {
                        return Err(Error::ValidationFailed(
                            "monthly day must be 1-31".to_string(),
                        ));
                    }
                }
            }
            "interval" => {
                if value.is_empty() {
                    return Err(Error::ValidationFailed(
                        "interval pattern requires number of days (e.g., interval:3)".to_string(),
                    ));
                }
                match value.parse::<u64>() {
                    Ok(days) if days >= 1 => RecurrenceKind::Interval,
                    _ => {
                        return Err(Error::ValidationFailed(
                            "interval must be a positive number".to_string(),
                        ));
                    }
                }
            }
            other => {
                return Err(Error::ValidationFailed(format!(
                    "unknown pattern type: {} (use: daily, weekly, monthly, interval)",
                    other
                )));
            }
        };

        let value = match kind {
            RecurrenceKind::Daily => String::new(),
            RecurrenceKind::Weekly => value.to_lowercase(),
            _ => value.to_string(),
        };

        let mut recurrence = Self {
            kind,
            value,
            next_due: today,
            last_completed: None,
            enabled: true,
        };
        recurrence.next_due = recurrence.checked_next_after(today).ok_or_else(|| {
            Error::ValidationFailed(format!("{} schedules past the last supported date", pattern))
        })?;
        Ok(recurrence)
    }

    /// The pattern this recurrence was parsed from.
    pub fn pattern(&self) -> String {
        if self.value.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}:{}", self.kind, self.value)
        }
    }

    /// Next occurrence strictly after `from`.
    ///
    /// A value that no longer parses (hand-edited file), or an occurrence
    /// beyond the calendar's range, yields `from`.
    pub fn next_after(&self, from: NaiveDate) -> NaiveDate {
        self.checked_next_after(from).unwrap_or(from)
    }

    fn checked_next_after(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self.kind {
            RecurrenceKind::Daily => from.checked_add_days(Days::new(1)),
            RecurrenceKind::Weekly => match parse_weekday(&self.value) {
                Ok(target) => {
                    let current = from.weekday().num_days_from_sunday();
                    let wanted = target.num_days_from_sunday();
                    let mut days_until = (wanted + 7 - current) % 7;
                    if days_until == 0 {
                        days_until = 7;
                    }
                    from.checked_add_days(Days::new(u64::from(days_until)))
                }
                Err(_) => Some(from),
            },
            RecurrenceKind::Monthly => match self.value.parse::<u32>() {
                Ok(day) => next_month_on_day(from, day),
                Err(_) => Some(from),
            },
            RecurrenceKind::Interval => match self.value.parse::<u64>() {
                Ok(days) => from.checked_add_days(Days::new(days)),
                Err(_) => Some(from),
            },
        }
    }

    /// Record a completion on `today` and schedule the next occurrence.
    pub fn complete(&mut self, today: NaiveDate) {
        self.last_completed = Some(today);
        self.next_due = self.next_after(today);
    }

    /// Whether an enabled schedule is due on or before `day`.
    pub fn is_due(&self, day: NaiveDate) -> bool {
        self.enabled && self.next_due <= day
    }
}

fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| Error::ValidationFailed(format!("unknown weekday: {}", value)))
}

/// The given day of the month following `from`, clamped to the month's length.
fn next_month_on_day(from: NaiveDate, day: u32) -> Option<NaiveDate> {
    let first = from.with_day(1)?.checked_add_months(Months::new(1))?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?.day();
    first.with_day(day.min(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_daily() {
        let r = Recurrence::parse("daily", day(2026, 1, 15)).unwrap();
        assert_eq!(r.kind, RecurrenceKind::Daily);
        assert_eq!(r.next_due, day(2026, 1, 16));
        assert!(r.enabled);
        assert_eq!(r.pattern(), "daily");
    }

    #[test]
    fn test_parse_interval() {
        let r = Recurrence::parse("interval:3", day(2026, 1, 15)).unwrap();
        assert_eq!(r.kind, RecurrenceKind::Interval);
        assert_eq!(r.next_due, day(2026, 1, 18));
        assert_eq!(r.pattern(), "interval:3");
    }

    #[test]
    fn test_parse_weekly_skips_to_next_week_on_same_day() {
        // 2026-01-15 is a Thursday
        let r = Recurrence::parse("weekly:thursday", day(2026, 1, 15)).unwrap();
        assert_eq!(r.next_due, day(2026, 1, 22));

        let r = Recurrence::parse("weekly:Friday", day(2026, 1, 15)).unwrap();
        assert_eq!(r.next_due, day(2026, 1, 16));
        assert_eq!(r.value, "friday");
    }

    #[test]
    fn test_parse_monthly_clamps_short_months() {
        let r = Recurrence::parse("monthly:31", day(2026, 1, 15)).unwrap();
        assert_eq!(r.next_due, day(2026, 2, 28));

        let r = Recurrence::parse("monthly:15", day(2026, 12, 20)).unwrap();
        assert_eq!(r.next_due, day(2027, 1, 15));
    }

    #[test]
    fn test_parse_rejects_invalid_patterns() {
        let today = day(2026, 1, 15);
        assert!(Recurrence::parse("weekly", today).is_err());
        assert!(Recurrence::parse("weekly:someday", today).is_err());
        assert!(Recurrence::parse("monthly:0", today).is_err());
        assert!(Recurrence::parse("monthly:32", today).is_err());
        assert!(Recurrence::parse("interval:0", today).is_err());
        assert!(Recurrence::parse("interval:abc", today).is_err());
        assert!(Recurrence::parse("hourly", today).is_err());
    }

    #[test]
    fn test_parse_rejects_interval_past_calendar_range() {
        let err = Recurrence::parse("interval:100000000000", day(2026, 1, 15)).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
        assert!(err.to_string().contains("interval:100000000000"));
    }

    #[test]
    fn test_next_after_at_calendar_end_stays_put() {
        let r = Recurrence::parse("daily", day(2026, 1, 15)).unwrap();
        assert_eq!(r.next_after(NaiveDate::MAX), NaiveDate::MAX);
    }

    #[test]
    fn test_complete_advances_schedule() {
        let mut r = Recurrence::parse("interval:3", day(2026, 1, 1)).unwrap();
        r.complete(day(2026, 1, 15));
        assert_eq!(r.last_completed, Some(day(2026, 1, 15)));
        assert_eq!(r.next_due, day(2026, 1, 18));
    }

    #[test]
    fn test_is_due() {
        let mut r = Recurrence::parse("daily", day(2026, 1, 15)).unwrap();
        assert!(!r.is_due(day(2026, 1, 15)));
        assert!(r.is_due(day(2026, 1, 16)));
        r.enabled = false;
        assert!(!r.is_due(day(2026, 1, 16)));
    }

    #[test]
    fn test_serialized_shape() {
        let r = Recurrence::parse("weekly:monday", day(2026, 1, 15)).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "weekly");
        assert_eq!(json["value"], "monday");
        assert_eq!(json["next_due"], "2026-01-19");
        assert!(json.get("last_completed").is_none());
    }
}
