//! Reminder drafts
//!
//! A draft is a reminder being assembled across one or more user turns. Each
//! turn produces a [`DraftUpdate`]; updates are merged field by field into the
//! sender's existing draft.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wire value of [`ReminderTime::Skip`]
pub const SKIP_TIME: &str = "skip";

const TIME_FORMAT: &str = "%H:%M";

/// Clock time of a reminder, or an explicit "no specific time"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTime {
    At(NaiveTime),
    /// All-day reminder
    Skip,
}

impl ReminderTime {
    /// Parse `"HH:MM"` (24-hour, also accepts `"HH:MM:SS"`) or `"skip"`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(SKIP_TIME) {
            return Some(Self::Skip);
        }
        NaiveTime::parse_from_str(raw, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
            .map(Self::At)
    }

    /// Specific clock time, if any
    pub fn clock(&self) -> Option<NaiveTime> {
        match self {
            Self::At(time) => Some(*time),
            Self::Skip => None,
        }
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(time) => write!(f, "{}", time.format(TIME_FORMAT)),
            Self::Skip => write!(f, "{}", SKIP_TIME),
        }
    }
}

impl Serialize for ReminderTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReminderTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid reminder time '{}'", raw)))
    }
}

/// How often a reminder repeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Accepted from the model but has no calendar projection
    Custom,
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "null" | "once" => Ok(Self::None),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annually" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown recurrence '{}'", other)),
        }
    }
}

/// The reminder being assembled for one sender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDraft {
    pub task: Option<String>,
    /// Legacy alias of `task`, kept equal to it
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<ReminderTime>,
    #[serde(default)]
    pub recurrence: Recurrence,
    pub day_of_week: Option<String>,
    pub notes: Option<String>,
}

/// Fields recovered from one utterance; `None` means "not mentioned"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftUpdate {
    pub task: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<ReminderTime>,
    pub recurrence: Option<Recurrence>,
    pub day_of_week: Option<String>,
    pub notes: Option<String>,
}

impl ReminderDraft {
    /// Merge an update over an optional prior draft.
    ///
    /// Values present in `update` win; absent ones inherit from `prior`.
    /// Recurrence falls back to `none` when neither side has one.
    pub fn merged(prior: Option<&ReminderDraft>, update: DraftUpdate) -> ReminderDraft {
        let prior_task = prior.and_then(|p| p.task_text().map(str::to_string));
        let task = update.task.or(prior_task);

        ReminderDraft {
            title: task.clone(),
            task,
            date: update.date.or_else(|| prior.and_then(|p| p.date)),
            time: update.time.or_else(|| prior.and_then(|p| p.time)),
            recurrence: update
                .recurrence
                .or_else(|| prior.map(|p| p.recurrence))
                .unwrap_or_default(),
            day_of_week: update
                .day_of_week
                .or_else(|| prior.and_then(|p| p.day_of_week.clone())),
            notes: update.notes.or_else(|| prior.and_then(|p| p.notes.clone())),
        }
    }

    /// Task text, falling back to the legacy title; blank counts as absent
    pub fn task_text(&self) -> Option<&str> {
        self.task
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.title.as_deref().filter(|t| !t.trim().is_empty()))
    }

    /// True when the user explicitly asked for no specific time
    pub fn skips_time(&self) -> bool {
        matches!(self.time, Some(ReminderTime::Skip))
    }
}
