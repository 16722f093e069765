//! Calendar wire types
//!
//! These mirror the JSON shapes exchanged with the calendar backend: events
//! carry either a timed start/end (`dateTime` + optional `timeZone`) or an
//! all-day start/end (`date`). The engine never caches these beyond the
//! lifetime of a single management session.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Format used for zone-local `dateTime` values sent to the calendar
pub const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Start or end of a calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    /// A specific instant, either RFC 3339 with offset or zone-local with `timeZone`
    Timed {
        #[serde(rename = "dateTime")]
        date_time: String,
        #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },

    /// An all-day marker
    AllDay { date: NaiveDate },
}

impl EventTime {
    /// Create a zone-local timed value
    pub fn timed(local: NaiveDateTime, time_zone: impl Into<String>) -> Self {
        Self::Timed {
            date_time: local.format(LOCAL_DATE_TIME_FORMAT).to_string(),
            time_zone: Some(time_zone.into()),
        }
    }

    /// Create an all-day value
    pub fn all_day(date: NaiveDate) -> Self {
        Self::AllDay { date }
    }

    /// Returns true for all-day values
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    /// Raw `dateTime` string for timed values
    pub fn date_time(&self) -> Option<&str> {
        match self {
            Self::Timed { date_time, .. } => Some(date_time),
            Self::AllDay { .. } => None,
        }
    }

    /// Date for all-day values
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::AllDay { date } => Some(*date),
            Self::Timed { .. } => None,
        }
    }
}

/// An event as returned by the calendar backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Backend identifier
    pub id: String,

    /// Summary line shown to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,

    /// RRULE lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,

    /// Link to the event in the calendar UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// Summary text, or an empty string when the event has none
    pub fn summary_text(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    /// Apply a patch in place, overwriting only the fields the patch carries
    pub fn apply(&mut self, patch: &EventPatch) {
        if let Some(summary) = &patch.summary {
            self.summary = Some(summary.clone());
        }
        if let Some(start) = &patch.start {
            self.start = Some(start.clone());
        }
        if let Some(end) = &patch.end {
            self.end = Some(end.clone());
        }
        if let Some(recurrence) = &patch.recurrence {
            self.recurrence = recurrence.clone();
        }
    }
}

/// Request body for creating an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub start: EventTime,

    pub end: EventTime,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
}

/// Identifier and link of a newly created event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    pub link: Option<String>,
}

/// Partial update of an event; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
}

impl EventPatch {
    /// Returns true when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.recurrence.is_none()
    }

    /// Reminders are instants or all-day markers: a new start without an end
    /// gets an identical end.
    pub fn normalized(mut self) -> Self {
        if self.end.is_none() {
            self.end = self.start.clone();
        }
        self
    }
}
