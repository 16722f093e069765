//! Completion policy: which fields a draft still needs, and what to ask next.

use super::draft::ReminderDraft;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;

/// A field the user still has to supply, in asking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingField {
    Task,
    Date,
    Time,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Task => "task",
            Self::Date => "date",
            Self::Time => "time",
        };
        f.write_str(name)
    }
}

/// Fields missing from `draft`, ordered task, date, time.
///
/// - task: neither `task` nor the legacy `title` is set
/// - date: one-off reminder with neither `date` nor `day_of_week`
/// - time: one-off reminder with a date but no time and no explicit skip
pub fn missing_fields(draft: &ReminderDraft) -> Vec<MissingField> {
    let mut missing = Vec::new();
    let one_off = !draft.recurrence.is_recurring();

    if draft.task_text().is_none() {
        missing.push(MissingField::Task);
    }

    let has_day_of_week = draft
        .day_of_week
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    if one_off && draft.date.is_none() && !has_day_of_week {
        missing.push(MissingField::Date);
    }

    if one_off && draft.date.is_some() && draft.time.is_none() {
        missing.push(MissingField::Time);
    }

    missing
}

/// The single question asking for the first missing field
pub fn clarification_question(missing: &[MissingField], today: NaiveDate) -> Option<String> {
    let question = match missing.first()? {
        MissingField::Task => "❓ What should I remind you about?\n\
             Examples: 'call mom', 'doctor appointment', 'take medicine', 'team meeting'"
            .to_string(),
        MissingField::Date => {
            let tomorrow = (today + Duration::days(1)).format("%B %d");
            let next_week = (today + Duration::days(7)).format("%B %d");
            format!(
                "📅 When should I set this reminder?\n\
                 Examples: 'tomorrow', 'next Monday', '{}', '{}', 'December 15'",
                tomorrow, next_week
            )
        }
        MissingField::Time => "🕐 At what time should I remind you?\n\
             Examples: '3pm', '2:30pm', '14:30', '8 in the morning'\n\
             Or reply 'no time' for an all-day reminder"
            .to_string(),
    };
    Some(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::draft::{Recurrence, ReminderTime};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn test_empty_draft_misses_task_and_date() {
        let missing = missing_fields(&ReminderDraft::default());
        assert_eq!(missing, vec![MissingField::Task, MissingField::Date]);
    }

    #[test]
    fn test_complete_one_off() {
        let draft = ReminderDraft {
            task: Some("call mom".to_string()),
            date: NaiveDate::from_ymd_opt(2025, 6, 11),
            time: ReminderTime::parse("15:00"),
            ..Default::default()
        };
        assert!(missing_fields(&draft).is_empty());
    }

    #[test]
    fn test_date_without_time_asks_time() {
        let draft = ReminderDraft {
            task: Some("dentist".to_string()),
            date: NaiveDate::from_ymd_opt(2025, 6, 11),
            ..Default::default()
        };
        assert_eq!(missing_fields(&draft), vec![MissingField::Time]);

        let skipped = ReminderDraft {
            time: Some(ReminderTime::Skip),
            ..draft
        };
        assert!(missing_fields(&skipped).is_empty());
    }

    #[test]
    fn test_day_of_week_satisfies_date() {
        let draft = ReminderDraft {
            title: Some("standup".to_string()),
            day_of_week: Some("Monday".to_string()),
            ..Default::default()
        };
        assert!(missing_fields(&draft).is_empty());
    }

    #[test]
    fn test_recurring_needs_neither_date_nor_time() {
        let draft = ReminderDraft {
            task: Some("take medicine".to_string()),
            recurrence: Recurrence::Daily,
            ..Default::default()
        };
        assert!(missing_fields(&draft).is_empty());
    }

    #[test]
    fn test_question_targets_first_missing_only() {
        let question =
            clarification_question(&[MissingField::Date, MissingField::Time], today()).unwrap();
        assert!(question.contains("When should I set this reminder?"));
        assert!(question.contains("June 11"));
        assert!(question.contains("June 17"));
        assert!(!question.contains("At what time"));

        assert!(clarification_question(&[], today()).is_none());
        assert!(clarification_question(&[MissingField::Time], today())
            .unwrap()
            .contains("no time"));
    }
}
