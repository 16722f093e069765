//! User-facing reply text
//!
//! Every message the conversation sends is built here so the state machine
//! and the service only decide *which* message to send.

use super::dates::{DateRange, RangeKind};
use super::draft::{ReminderDraft, ReminderTime};
use crate::calendar::{event_local_date, event_time_in};
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use sdk::types::{CalendarEvent, EventTime};
use std::fmt::Write;

/// What happened to the calendar side of a new reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarOutcome {
    Created { link: Option<String> },
    Failed,
    NotConfigured,
}

/// Today / Tomorrow / Yesterday, else "Monday, December 15, 2025"
pub fn friendly_date(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if date == today + Duration::days(1) {
        "Tomorrow".to_string()
    } else if date == today - Duration::days(1) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %B %d, %Y").to_string()
    }
}

/// "Wednesday, June 11 at 03:00 PM" or "Wednesday, June 11 - All-day"
pub fn event_when(event: &CalendarEvent, tz: Tz) -> String {
    match event.start.as_ref() {
        Some(EventTime::AllDay { date }) => format!("{} - All-day", date.format("%A, %B %d")),
        Some(timed) => match event_time_in(timed, tz) {
            Some(local) => format!(
                "{} at {}",
                local.format("%A, %B %d"),
                local.format("%I:%M %p")
            ),
            None => "Unable to parse date/time".to_string(),
        },
        None => "Date/time not specified".to_string(),
    }
}

/// Clock part of [`event_when`], or "All-day"
fn event_clock(event: &CalendarEvent, tz: Tz) -> String {
    match event.start.as_ref() {
        Some(EventTime::AllDay { .. }) => "All-day".to_string(),
        Some(timed) => event_time_in(timed, tz)
            .map(|local| local.format("%I:%M %p").to_string())
            .unwrap_or_else(|| "Time unknown".to_string()),
        None => "Time not specified".to_string(),
    }
}

fn summary_of(event: &CalendarEvent) -> &str {
    match event.summary_text() {
        "" => "(untitled)",
        summary => summary,
    }
}

fn management_footer(msg: &mut String, count: usize) {
    msg.push_str("\n🔧 Management Options:\n");
    let _ = writeln!(msg, "   Reply with a number (1-{}) to edit or delete", count);
    msg.push_str("   Reply 'cancel' to exit management mode\n\n");
    msg.push_str("What would you like to do with these reminders?");
}

/// Numbered list for a single day
pub fn day_listing(name: &str, reminders: &[CalendarEvent], date: NaiveDate, today: NaiveDate, tz: Tz) -> String {
    let mut msg = format!("📅 Your Reminders for {}\n\n", friendly_date(date, today));
    let _ = writeln!(msg, "Hi {} 👋, here are your scheduled reminders:\n", name);
    for (i, reminder) in reminders.iter().enumerate() {
        let _ = writeln!(msg, "{}. {}", i + 1, summary_of(reminder));
        let _ = writeln!(msg, "   ⏰ {}\n", event_when(reminder, tz));
    }
    management_footer(&mut msg, reminders.len());
    msg
}

/// Order reminders the way [`range_listing`] numbers them
pub fn range_display_order(reminders: Vec<CalendarEvent>, tz: Tz) -> Vec<CalendarEvent> {
    let mut keyed: Vec<(Option<NaiveDate>, CalendarEvent)> = reminders
        .into_iter()
        .map(|event| (event_local_date(&event, tz), event))
        .collect();
    // Undated events sort last; sort is stable so backend order holds within a day
    keyed.sort_by_key(|(date, _)| (date.is_none(), *date));
    keyed.into_iter().map(|(_, event)| event).collect()
}

fn range_title(range: &DateRange, today: NaiveDate) -> (String, String) {
    let title = match range.kind {
        RangeKind::Week => "📅 Your Reminders for the Week",
        RangeKind::Month => "📅 Your Reminders for the Month",
    };
    let subtitle = format!(
        "({} to {})",
        friendly_date(range.start, today),
        friendly_date(range.end, today)
    );
    (title.to_string(), subtitle)
}

/// Reminders grouped by local date, numbered continuously across groups.
///
/// `reminders` must already be in [`range_display_order`].
pub fn range_listing(name: &str, reminders: &[CalendarEvent], range: &DateRange, today: NaiveDate, tz: Tz) -> String {
    let (title, subtitle) = range_title(range, today);
    let mut msg = format!("{}\n{}\n\n", title, subtitle);
    let _ = writeln!(msg, "Hi {} 👋, here are your scheduled reminders:\n", name);

    let mut current: Option<Option<NaiveDate>> = None;
    for (i, reminder) in reminders.iter().enumerate() {
        let date = event_local_date(reminder, tz);
        if current != Some(date) {
            if current.is_some() {
                msg.push('\n');
            }
            match date {
                Some(date) => {
                    let _ = writeln!(msg, "📆 {}:", friendly_date(date, today));
                }
                None => msg.push_str("📆 Date not specified:\n"),
            }
            current = Some(date);
        }
        let _ = writeln!(
            msg,
            "   {}. {} - {}",
            i + 1,
            summary_of(reminder),
            event_clock(reminder, tz)
        );
    }
    msg.push('\n');
    management_footer(&mut msg, reminders.len());
    msg
}

pub fn empty_day(name: &str, date: NaiveDate, today: NaiveDate) -> String {
    format!(
        "Hi {} 👋\n\n\
         📅 You have no reminders scheduled for {}.\n\n\
         Want to create one? Just tell me:\n\
         \u{20}  • 'Remind me to call mom at 3pm'\n\
         \u{20}  • 'Doctor appointment tomorrow'\n\
         \u{20}  • 'Team meeting next Monday'\n\n\
         Or try asking about other dates:\n\
         \u{20}  • 'Show my reminders for tomorrow'\n\
         \u{20}  • 'What's my schedule this week'\n\
         \u{20}  • 'List reminders for December 15'",
        name,
        friendly_date(date, today)
    )
}

pub fn empty_range(name: &str, range: &DateRange, today: NaiveDate) -> String {
    let (title, subtitle) = range_title(range, today);
    format!(
        "{}\n\nHi {} 👋\n\n\
         You have no reminders scheduled for {}.\n\n\
         Want to create some? Try:\n\
         \u{20}  • 'Remind me to call mom tomorrow at 3pm'\n\
         \u{20}  • 'Meeting every Monday at 10am'\n\
         \u{20}  • 'Doctor appointment next Friday'",
        title,
        name,
        subtitle.to_lowercase()
    )
}

pub fn listing_reprompt(count: usize) -> String {
    format!(
        "Please enter a number between 1 and {}, or 'cancel' to exit.",
        count
    )
}

pub fn action_menu(event: &CalendarEvent, tz: Tz) -> String {
    format!(
        "📝 Selected Reminder:\n\
         \u{20}  Task: {}\n\
         \u{20}  Time: {}\n\n\
         What would you like to do?\n\
         \u{20}  1 - ✏️ Edit this reminder\n\
         \u{20}  2 - 🗑️ Delete this reminder\n\
         \u{20}  3 - ↩️ Cancel and go back\n\n\
         Reply with 1, 2, or 3.",
        summary_of(event),
        event_when(event, tz)
    )
}

pub fn action_reprompt() -> String {
    "Please enter 1 (Edit), 2 (Delete), or 3 (Cancel).".to_string()
}

pub fn action_number_reprompt() -> String {
    "Please enter 1, 2, or 3.".to_string()
}

pub fn editing_prompt(event: &CalendarEvent, tz: Tz) -> String {
    format!(
        "Editing Reminder:\n\
         \u{20}  Current: {}\n\
         \u{20}  Time: {}\n\n\
         Tell me what to change:\n\
         \u{20}  • 'Change time to 4pm'\n\
         \u{20}  • 'Move to tomorrow'\n\
         \u{20}  • 'Rename to call doctor'\n\
         \u{20}  • 'Make it daily'\n\n\
         Or describe the new reminder details.",
        summary_of(event),
        event_when(event, tz)
    )
}

pub fn edit_not_understood() -> String {
    "I couldn't understand how to edit the reminder.\n\n\
     Try being more specific:\n\
     \u{20}  • 'Change time to 4pm'\n\
     \u{20}  • 'Move to next Monday'\n\
     \u{20}  • 'Rename to doctor appointment'\n\n\
     Or type 'cancel' to go back."
        .to_string()
}

pub fn updated(event: &CalendarEvent, tz: Tz) -> String {
    let mut msg = String::from("✅ Reminder Updated Successfully.\n\n📋 New Details:\n");
    let _ = writeln!(msg, "   Task: {}", summary_of(event));
    match event.start.as_ref() {
        Some(EventTime::AllDay { date }) => {
            let _ = writeln!(msg, "   Date: {} (All-day)", date.format("%A, %B %d, %Y"));
        }
        Some(timed) => {
            if let Some(local) = event_time_in(timed, tz) {
                let _ = writeln!(msg, "   Date: {}", local.format("%A, %B %d, %Y"));
                let _ = writeln!(msg, "   Time: {}", local.format("%I:%M %p"));
            }
        }
        None => {}
    }
    if let Some(rule) = event.recurrence.first() {
        let _ = writeln!(msg, "   Repeat: {}", rule.trim_start_matches("RRULE:"));
    }
    msg.push_str("\nYour reminder has been updated successfully.");
    msg
}

pub fn update_failed() -> String {
    "❌ Failed to update the reminder. Please try again later.".to_string()
}

pub fn deleted(event: &CalendarEvent, tz: Tz) -> String {
    format!(
        "🗑️ Reminder Deleted Successfully.\n\n\
         Removed: {}\n\
         Was scheduled for: {}\n\n\
         You can create new reminders anytime or list your remaining ones.",
        summary_of(event),
        event_when(event, tz)
    )
}

pub fn delete_failed() -> String {
    "❌ Failed to delete the reminder. Please try again later or contact support.".to_string()
}

pub fn management_exited() -> String {
    "Management mode exited. You can create new reminders or list them again.".to_string()
}

pub fn selection_lost() -> String {
    "That selection is no longer available. Please list your reminders again.".to_string()
}

pub fn nothing_to_delete(name: &str) -> String {
    format!(
        "Hi {} 👋\n\n📅 You have no reminders to delete.\n\n\
         You can create new reminders anytime by telling me what you need to remember.",
        name
    )
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

pub fn delete_all_summary(name: &str, deleted: usize, failed: usize) -> String {
    let mut msg = format!("Hi {} 👋\n\n", name);
    if deleted > 0 {
        let _ = write!(
            msg,
            "✅ Successfully deleted {} reminder{}.\n\n",
            deleted,
            plural(deleted)
        );
    }
    if failed > 0 {
        let _ = write!(
            msg,
            "❌ Failed to delete {} reminder{}. Please try again later.\n\n",
            failed,
            plural(failed)
        );
    }
    msg.push_str("You can create new reminders anytime.");
    msg
}

pub fn calendar_error(name: &str, action: &str) -> String {
    format!(
        "Hi {}.\n\nSorry, I encountered an error while {}. Please try again later.",
        name, action
    )
}

pub fn management_unavailable(name: &str) -> String {
    format!(
        "Hi {} 👋\n\n📅 Calendar is not configured, so I can't list or manage reminders right now.\n\n\
         You can still tell me what you'd like to be reminded about.",
        name
    )
}

fn draft_time_label(draft: &ReminderDraft) -> String {
    match draft.time {
        Some(ReminderTime::At(time)) => time.format("%H:%M").to_string(),
        Some(ReminderTime::Skip) => "No specific time (all-day)".to_string(),
        None => "Not specified".to_string(),
    }
}

/// Current draft followed by the single clarification question
pub fn clarification(name: &str, draft: &ReminderDraft, question: &str) -> String {
    let mut msg = format!(
        "Hi {} 👋\n\nI'm setting up your reminder and need a bit more information:\n\n📝 Current Reminder:\n",
        name
    );
    let _ = writeln!(msg, "   Task: {}", draft.task_text().unwrap_or("Not specified"));
    let _ = writeln!(
        msg,
        "   Date: {}",
        draft
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Not specified".to_string())
    );
    let _ = writeln!(msg, "   Time: {}", draft_time_label(draft));
    if draft.recurrence.is_recurring() {
        let _ = writeln!(msg, "   Repeat: {}", draft.recurrence);
    }
    let _ = write!(
        msg,
        "\n{}\n\nJust reply with the missing information and I'll complete your reminder.",
        question
    );
    msg
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Confirmation after a reminder is created
pub fn acknowledgement(name: &str, draft: &ReminderDraft, outcome: &CalendarOutcome) -> String {
    let mut msg = format!(
        "✅ Reminder Set Successfully\n\n\
         Hi {}! Your reminder has been created with the following details:\n\n\
         📋 Reminder Details:\n",
        name
    );
    let _ = writeln!(msg, "   Task: {}", draft.task_text().unwrap_or("Reminder"));
    if let Some(date) = draft.date {
        let _ = writeln!(msg, "   Date: {}", date.format("%A, %B %d, %Y"));
    }
    match draft.time {
        Some(ReminderTime::At(time)) => {
            let _ = writeln!(msg, "   Time: {}", time.format("%I:%M %p"));
        }
        Some(ReminderTime::Skip) => msg.push_str("   Time: All-day reminder\n"),
        None => {}
    }
    if draft.recurrence.is_recurring() {
        let _ = writeln!(msg, "   Repeat: {}", title_case(draft.recurrence.as_str()));
    }
    if let Some(day) = draft.day_of_week.as_deref() {
        let _ = writeln!(msg, "   Day: {}", day);
    }
    if let Some(notes) = draft.notes.as_deref() {
        let _ = writeln!(msg, "   Notes: {}", notes);
    }

    let calendar = match outcome {
        CalendarOutcome::Created { link: Some(link) } => {
            format!("Calendar: Event created successfully.\nLink: {}", link)
        }
        CalendarOutcome::Created { link: None } => {
            "Calendar: Event created but no link available".to_string()
        }
        CalendarOutcome::Failed => {
            "Calendar: Failed to create event. Please try again later.".to_string()
        }
        CalendarOutcome::NotConfigured => {
            "Calendar: Not configured (reminder not synced)".to_string()
        }
    };
    let _ = write!(
        msg,
        "\n{}\n\nI'll make sure to remind you! Have a great day 😊",
        calendar
    );
    msg
}

pub fn unsupported_recurrence(name: &str, draft: &ReminderDraft) -> String {
    format!(
        "Hi {} 👋\n\n\
         I can't set up a '{}' repeat for \"{}\" yet.\n\n\
         Supported repeats are hourly, daily, weekly, monthly and yearly. \
         Please send the reminder again with one of those, or without a repeat.",
        name,
        draft.recurrence,
        draft.task_text().unwrap_or("this reminder")
    )
}

/// Example-driven help after an utterance could not be understood
pub fn guidance(name: &str) -> String {
    format!(
        "Hi {} 👋\n\n\
         I couldn't understand your reminder request. Let me help you.\n\n\
         Try examples like:\n\
         \u{20}  • 'Remind me to call mom tomorrow at 3pm'\n\
         \u{20}  • 'Doctor appointment on December 15'\n\
         \u{20}  • 'Take medicine daily at 8am'\n\
         \u{20}  • 'Team meeting every Monday at 10am'\n\
         \u{20}  • 'Pay rent on 1st of every month'\n\n\
         📅 Or manage your reminders:\n\
         \u{20}  • 'List my reminders today'\n\
         \u{20}  • 'Show reminders for tomorrow'\n\
         \u{20}  • 'What do I have next Monday'\n\
         \u{20}  • 'My schedule this week'\n\
         \u{20}  • 'Show agenda for December 15'\n\
         \u{20}  • 'What's on my calendar next month'\n\
         \u{20}  • 'Delete all reminders'\n\n\
         Try again and I'll help you set up your reminder.",
        name
    )
}

pub fn apology(name: &str) -> String {
    format!(
        "Hi {}.\n\nSorry, something went wrong while handling your message. Please try again in a moment.",
        name
    )
}
