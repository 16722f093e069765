//! Calendar backend abstraction
//!
//! The conversation engine reads and writes reminders through the
//! [`EventStore`] trait. Two implementations ship with the engine:
//!
//! - [`GoogleCalendarStore`]: REST client for Google Calendar v3
//! - [`InMemoryEventStore`]: process-local store for offline simulation and tests
//!
//! Every call is fallible and network-bound; nothing here retries.
//! [`oauth`] obtains the refresh token the Google store runs on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use sdk::types::{CalendarEvent, CreatedEvent, EventPatch, EventTime, NewEvent, LOCAL_DATE_TIME_FORMAT};

pub mod google;
pub mod memory;
pub mod oauth;

pub use google::{GoogleAuth, GoogleCalendarStore};
pub use memory::InMemoryEventStore;

/// Result type for calendar operations
pub type Result<T> = std::result::Result<T, CalendarError>;

/// Default result cap for a single-day listing
pub const DAY_MAX_RESULTS: u32 = 50;

/// Errors surfaced by an [`EventStore`]
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar is not configured")]
    Unavailable,

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Calendar authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Calendar network error: {0}")]
    Network(String),

    #[error("Calendar API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse calendar response: {0}")]
    Parse(String),
}

impl From<CalendarError> for sdk::EngineError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::Unavailable => Self::CalendarUnavailable,
            CalendarError::Network(message) => Self::Network(message),
            other => Self::Calendar(other.to_string()),
        }
    }
}

/// Inclusive window of local time used for listing queries
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub max_results: u32,
}

impl TimeRange {
    /// Local midnight to 23:59:59 of a single day
    pub fn day(date: NaiveDate, tz: Tz) -> Self {
        Self::days(date, date, tz).with_max_results(DAY_MAX_RESULTS)
    }

    /// Local midnight of `first` to 23:59:59 of `last`
    pub fn days(first: NaiveDate, last: NaiveDate, tz: Tz) -> Self {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self {
            start: localize(tz, first.and_time(NaiveTime::MIN)),
            end: localize(tz, last.and_time(end_of_day)),
            max_results: 100,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// True when `instant` falls inside the window
    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        *instant >= self.start && *instant <= self.end
    }
}

/// Calendar collaborator used by the conversation engine
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &str;

    /// Events starting inside `range`, ordered by start time
    async fn list(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>>;

    async fn create(&self, event: &NewEvent) -> Result<CreatedEvent>;

    /// Apply a partial update, returning the stored event
    async fn update(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<CalendarEvent>;
}

/// Resolve a naive local datetime in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; nonexistent times
/// (DST spring-forward) are read as UTC wall time and converted.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Start (or end) of an event expressed in the user timezone.
///
/// Handles offset-qualified RFC 3339 values, zone-local values with a
/// `timeZone`, and all-day dates (local midnight).
pub fn event_time_in(time: &EventTime, tz: Tz) -> Option<DateTime<Tz>> {
    match time {
        EventTime::AllDay { date } => Some(localize(tz, date.and_time(NaiveTime::MIN))),
        EventTime::Timed {
            date_time,
            time_zone,
        } => {
            let normalized = date_time.replace('Z', "+00:00");
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
                return Some(parsed.with_timezone(&tz));
            }
            let naive = NaiveDateTime::parse_from_str(date_time, LOCAL_DATE_TIME_FORMAT).ok()?;
            let zone = time_zone
                .as_deref()
                .and_then(|name| name.parse::<Tz>().ok())
                .unwrap_or(tz);
            Some(localize(zone, naive).with_timezone(&tz))
        }
    }
}

/// Local calendar date an event starts on
pub fn event_local_date(event: &CalendarEvent, tz: Tz) -> Option<NaiveDate> {
    match event.start.as_ref()? {
        EventTime::AllDay { date } => Some(*date),
        timed => event_time_in(timed, tz).map(|dt| dt.date_naive()),
    }
}
