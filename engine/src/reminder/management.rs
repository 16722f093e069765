//! Reminder management: list, select, edit, delete
//!
//! A sender moves through [`ManagementSession`] states by replying to numbered
//! menus. Each state carries only what its transitions need, and every
//! transition returns an [`Outcome`]: the reply to send plus the session to
//! store next (`None` returns the sender to idle).

use super::dates::{DateRange, DateResolver, Resolved};
use super::extractor::ReminderExtractor;
use super::format;
use crate::calendar::{EventStore, TimeRange};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use sdk::types::CalendarEvent;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

/// Replies that leave management mode from any state
pub const CANCEL_TOKENS: &[&str] = &["cancel", "exit", "done", "back"];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid intent pattern"))
        .collect()
}

/// Bulk delete requests. The bare "everything" forms only count as the whole message.
fn delete_all_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile(&[
            r"\b(?:delete|remove|clear)\s+all\s+(?:of\s+)?(?:my\s+)?reminders\b",
            r"^(?:please\s+)?(?:delete|remove|clear)\s+everything[.!]*$",
        ])
    })
}

/// List and agenda phrasing. Creation requests ("set a reminder for ...",
/// "add milk to my shopping list") must not match.
fn list_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile(&[
            r"^(?:please\s+|can you\s+|could you\s+)?(?:list|show|display|view)\b",
            r"\b(?:list|show|display|view|see|check)\b.*\b(?:reminders|schedule|agenda|appointments|events|calendar)\b",
            r"\bmy\s+(?:reminders|schedule|agenda|appointments|events)\b",
            r"\b(?:reminders|events|agenda|schedule)\s+(?:for|on)\b",
            r"^what(?:['’]s|\s+is|\s+are)?\s+(?:on|my)\b",
            r"\bwhat do i have\b",
            r"^what\b.*\b(?:today|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            r"^what\b.*\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\b",
        ])
    })
}

/// A management request recognized in an idle sender's message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    List,
    DeleteAll,
}

/// Classify an idle sender's message. Delete-all wins over list.
pub fn detect_intent(text: &str) -> Option<Intent> {
    let lower = text.trim().to_lowercase();
    if delete_all_patterns().iter().any(|re| re.is_match(&lower)) {
        return Some(Intent::DeleteAll);
    }
    if list_patterns().iter().any(|re| re.is_match(&lower)) {
        return Some(Intent::List);
    }
    None
}

fn selection_lost(mode: &str, selected: usize, count: usize) -> Outcome {
    tracing::warn!(mode, selected, count, "Selected reminder out of range, discarding session");
    Outcome::idle(format::selection_lost())
}

pub fn is_cancel(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    CANCEL_TOKENS.contains(&lower.as_str())
}

fn parse_selection(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// What produced a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListScope {
    Day { date: NaiveDate },
    Range { range: DateRange },
}

/// Per-sender management state.
///
/// Transitions only build sessions whose `selected` indexes into `reminders`.
/// A session from elsewhere that breaks this is discarded on the next reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ManagementSession {
    Listing {
        reminders: Vec<CalendarEvent>,
        scope: ListScope,
    },
    ActionSelected {
        reminders: Vec<CalendarEvent>,
        selected: usize,
        scope: ListScope,
    },
    Editing {
        reminders: Vec<CalendarEvent>,
        selected: usize,
        scope: ListScope,
    },
}

impl ManagementSession {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Listing { .. } => "listing",
            Self::ActionSelected { .. } => "action_selected",
            Self::Editing { .. } => "editing",
        }
    }

    pub fn reminders(&self) -> &[CalendarEvent] {
        match self {
            Self::Listing { reminders, .. }
            | Self::ActionSelected { reminders, .. }
            | Self::Editing { reminders, .. } => reminders,
        }
    }

    /// The chosen reminder in `action_selected` and `editing`
    pub fn selected(&self) -> Option<&CalendarEvent> {
        match self {
            Self::Listing { .. } => None,
            Self::ActionSelected {
                reminders, selected, ..
            }
            | Self::Editing {
                reminders, selected, ..
            } => reminders.get(*selected),
        }
    }
}

/// Reply plus the session to keep
#[derive(Debug, Clone)]
pub struct Outcome {
    pub reply: String,
    pub next: Option<ManagementSession>,
}

impl Outcome {
    fn idle(reply: String) -> Self {
        Self { reply, next: None }
    }

    fn stay(reply: String, session: ManagementSession) -> Self {
        Self {
            reply,
            next: Some(session),
        }
    }
}

/// Drives [`ManagementSession`] transitions against an [`EventStore`]
pub struct ManagementMachine {
    store: Arc<dyn EventStore>,
    extractor: Arc<ReminderExtractor>,
    resolver: DateResolver,
    delete_all_window_days: i64,
}

impl ManagementMachine {
    pub fn new(
        store: Arc<dyn EventStore>,
        extractor: Arc<ReminderExtractor>,
        resolver: DateResolver,
        delete_all_window_days: u32,
    ) -> Self {
        Self {
            store,
            extractor,
            resolver,
            delete_all_window_days: i64::from(delete_all_window_days),
        }
    }

    /// Start a management request from idle
    pub async fn start(&self, intent: Intent, text: &str, name: &str, now: DateTime<Utc>) -> Outcome {
        match intent {
            Intent::DeleteAll => self.delete_all(name, now).await,
            Intent::List => self.list(text, name, now).await,
        }
    }

    /// Advance an existing session with the sender's reply
    pub async fn handle(
        &self,
        session: ManagementSession,
        text: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        if is_cancel(text) {
            tracing::debug!(mode = session.mode(), "Management session cancelled");
            return Outcome::idle(format::management_exited());
        }

        match session {
            ManagementSession::Listing { reminders, scope } => {
                let count = reminders.len();
                match parse_selection(text) {
                    Some(n) if n >= 1 && n as usize <= count => {
                        let selected = n as usize - 1;
                        let reply = format::action_menu(&reminders[selected], self.tz());
                        Outcome::stay(
                            reply,
                            ManagementSession::ActionSelected {
                                reminders,
                                selected,
                                scope,
                            },
                        )
                    }
                    _ => Outcome::stay(
                        format::listing_reprompt(count),
                        ManagementSession::Listing { reminders, scope },
                    ),
                }
            }

            ManagementSession::ActionSelected {
                reminders,
                selected,
                scope,
            } => {
                let Some(event) = reminders.get(selected) else {
                    return selection_lost("action_selected", selected, reminders.len());
                };
                match parse_selection(text) {
                    Some(1) => {
                        let reply = format::editing_prompt(event, self.tz());
                        Outcome::stay(
                            reply,
                            ManagementSession::Editing {
                                reminders,
                                selected,
                                scope,
                            },
                        )
                    }
                    Some(2) => self.delete_one(event).await,
                    Some(3) => {
                        let reply = self.listing_text(&reminders, &scope, name, now);
                        Outcome::stay(reply, ManagementSession::Listing { reminders, scope })
                    }
                    Some(_) => Outcome::stay(
                        format::action_number_reprompt(),
                        ManagementSession::ActionSelected {
                            reminders,
                            selected,
                            scope,
                        },
                    ),
                    None => Outcome::stay(
                        format::action_reprompt(),
                        ManagementSession::ActionSelected {
                            reminders,
                            selected,
                            scope,
                        },
                    ),
                }
            }

            ManagementSession::Editing {
                reminders,
                selected,
                scope,
            } => {
                let Some(event) = reminders.get(selected) else {
                    return selection_lost("editing", selected, reminders.len());
                };
                let patch = match self.extractor.edit_intent(text, event, now).await {
                    Ok(patch) => patch,
                    Err(e) => {
                        tracing::warn!(error = %e, "Edit instruction not understood");
                        return Outcome::stay(
                            format::edit_not_understood(),
                            ManagementSession::Editing {
                                reminders,
                                selected,
                                scope,
                            },
                        );
                    }
                };

                match self.store.update(&event.id, &patch).await {
                    Ok(updated) => {
                        tracing::info!(event_id = %event.id, "Reminder updated");
                        Outcome::idle(format::updated(&updated, self.tz()))
                    }
                    Err(e) => {
                        tracing::error!(event_id = %event.id, error = %e, "Failed to update reminder");
                        Outcome::idle(format::update_failed())
                    }
                }
            }
        }
    }

    fn tz(&self) -> chrono_tz::Tz {
        self.resolver.timezone()
    }

    async fn delete_one(&self, event: &CalendarEvent) -> Outcome {
        match self.store.delete(&event.id).await {
            Ok(()) => {
                tracing::info!(event_id = %event.id, "Reminder deleted");
                Outcome::idle(format::deleted(event, self.tz()))
            }
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Failed to delete reminder");
                Outcome::idle(format::delete_failed())
            }
        }
    }

    /// Scope named by `text`, defaulting to today
    pub fn scope_for(&self, text: &str, now: DateTime<Utc>) -> ListScope {
        match self.resolver.resolve(text, now) {
            Some(Resolved::Day { date }) => ListScope::Day { date },
            Some(Resolved::Range { range }) => ListScope::Range { range },
            None => ListScope::Day {
                date: self.resolver.today(now),
            },
        }
    }

    /// Events with a summary inside `scope`, in display order
    pub async fn fetch(&self, scope: &ListScope) -> crate::calendar::Result<Vec<CalendarEvent>> {
        let tz = self.tz();
        let range = match scope {
            ListScope::Day { date } => TimeRange::day(*date, tz),
            ListScope::Range { range } => TimeRange::days(range.start, range.end, tz),
        };
        let events: Vec<CalendarEvent> = self
            .store
            .list(&range)
            .await?
            .into_iter()
            .filter(|e| !e.summary_text().trim().is_empty())
            .collect();

        Ok(match scope {
            ListScope::Day { .. } => events,
            ListScope::Range { .. } => format::range_display_order(events, tz),
        })
    }

    async fn list(&self, text: &str, name: &str, now: DateTime<Utc>) -> Outcome {
        let scope = self.scope_for(text, now);
        let today = self.resolver.today(now);

        let reminders = match self.fetch(&scope).await {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list reminders");
                return Outcome::idle(format::calendar_error(name, "fetching your reminders"));
            }
        };
        tracing::info!(count = reminders.len(), scope = ?scope, "Listed reminders");

        if reminders.is_empty() {
            let reply = match &scope {
                ListScope::Day { date } => format::empty_day(name, *date, today),
                ListScope::Range { range } => format::empty_range(name, range, today),
            };
            return Outcome::idle(reply);
        }

        let reply = self.listing_text(&reminders, &scope, name, now);
        Outcome::stay(reply, ManagementSession::Listing { reminders, scope })
    }

    fn listing_text(&self, reminders: &[CalendarEvent], scope: &ListScope, name: &str, now: DateTime<Utc>) -> String {
        let today = self.resolver.today(now);
        match scope {
            ListScope::Day { date } => format::day_listing(name, reminders, *date, today, self.tz()),
            ListScope::Range { range } => format::range_listing(name, reminders, range, today, self.tz()),
        }
    }

    async fn delete_all(&self, name: &str, now: DateTime<Utc>) -> Outcome {
        let today = self.resolver.today(now);
        let last: NaiveDate = today + Duration::days(self.delete_all_window_days);
        let range = TimeRange::days(today, last, self.tz());

        let events = match self.store.list(&range).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch reminders for bulk delete");
                return Outcome::idle(format::calendar_error(name, "deleting your reminders"));
            }
        };

        if events.is_empty() {
            return Outcome::idle(format::nothing_to_delete(name));
        }

        let mut deleted = 0;
        let mut failed = 0;
        for event in &events {
            match self.store.delete(&event.id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(event_id = %event.id, error = %e, "Bulk delete failed for event");
                    failed += 1;
                }
            }
        }
        tracing::info!(deleted, failed, "Bulk delete finished");

        Outcome::idle(format::delete_all_summary(name, deleted, failed))
    }
}
