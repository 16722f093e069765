//! Projection of a complete draft onto the calendar's create shape.

use super::draft::{Recurrence, ReminderDraft};
use chrono::NaiveDate;
use sdk::types::{EventTime, NewEvent};

/// Summary used when a draft reaches projection without task text
pub const FALLBACK_SUMMARY: &str = "Reminder";

/// Errors raised while projecting a draft
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("recurrence '{0}' has no calendar rule")]
    UnsupportedRecurrence(Recurrence),
}

/// RRULE line for a recurrence, `Ok(None)` for one-off reminders
pub fn recurrence_rule(recurrence: Recurrence) -> Result<Option<String>, ProjectionError> {
    let freq = match recurrence {
        Recurrence::None => return Ok(None),
        Recurrence::Hourly => "HOURLY",
        Recurrence::Daily => "DAILY",
        Recurrence::Weekly => "WEEKLY",
        Recurrence::Monthly => "MONTHLY",
        Recurrence::Yearly => "YEARLY",
        Recurrence::Custom => return Err(ProjectionError::UnsupportedRecurrence(recurrence)),
    };
    Ok(Some(format!("RRULE:FREQ={}", freq)))
}

/// Maps drafts to [`NewEvent`]s in a fixed timezone
#[derive(Debug, Clone)]
pub struct EventProjector {
    time_zone: String,
}

impl EventProjector {
    pub fn new(time_zone: impl Into<String>) -> Self {
        Self {
            time_zone: time_zone.into(),
        }
    }

    /// Build the create request for `draft`.
    ///
    /// - timed: date plus clock time, identical start and end `dateTime`
    /// - all-day: date with no time or an explicit skip
    /// - no date: all-day on `today`
    pub fn project(&self, draft: &ReminderDraft, today: NaiveDate) -> Result<NewEvent, ProjectionError> {
        let recurrence: Vec<String> = recurrence_rule(draft.recurrence)?.into_iter().collect();

        let task = draft.task_text().unwrap_or(FALLBACK_SUMMARY);
        let clock = draft.time.and_then(|t| t.clock());

        let summary = match clock {
            Some(time) => format!("{} at {}", task, time.format("%H:%M")),
            None => task.to_string(),
        };

        let (start, end) = match (draft.date, clock) {
            (Some(date), Some(time)) => {
                let at = EventTime::timed(date.and_time(time), self.time_zone.clone());
                (at.clone(), at)
            }
            (Some(date), None) => (EventTime::all_day(date), EventTime::all_day(date)),
            (None, _) => (EventTime::all_day(today), EventTime::all_day(today)),
        };

        let mut description = Vec::new();
        if let Some(notes) = draft.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            description.push(format!("Notes: {}", notes));
        }
        if let Some(day) = draft.day_of_week.as_deref().filter(|d| !d.trim().is_empty()) {
            description.push(format!("Preferred day: {}", day));
        }

        Ok(NewEvent {
            summary,
            description: (!description.is_empty()).then(|| description.join("\n")),
            start,
            end,
            recurrence,
        })
    }
}
