//! Conversation service
//!
//! [`ReminderService`] is the entry point for every inbound text. It
//! serializes handling per sender, routes the message to an open management
//! session, a new management request or draft filling (in that order), and
//! delivers exactly one reply through the configured [`MessageChannel`].

use super::completion::{clarification_question, missing_fields, MissingField};
use super::dates::DateResolver;
use super::draft::ReminderDraft;
use super::extractor::{ExtractionError, ReminderExtractor};
use super::format::{self, CalendarOutcome};
use super::management::{detect_intent, ManagementMachine, ManagementSession};
use super::projector::EventProjector;
use super::session::{InMemorySessionStore, SenderLocks, SessionStore};
use crate::calendar::{CalendarError, EventStore, TimeRange};
use crate::channel::MessageChannel;
use crate::config::ConversationConfig;
use crate::telemetry::mask_sender;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sdk::types::{CalendarEvent, NewEvent};
use serde::Serialize;
use std::sync::Arc;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Stored state for every sender, for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct ConversationsSnapshot {
    pub drafts: Vec<SenderDraft>,
    pub sessions: Vec<SenderSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderDraft {
    pub sender: String,
    pub draft: ReminderDraft,
    pub missing: Vec<MissingField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderSession {
    pub sender: String,
    pub session: ManagementSession,
}

/// Result of a side-effect free extraction
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub draft: ReminderDraft,
    pub missing: Vec<MissingField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<NewEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_error: Option<String>,
}

/// Handles inbound texts end to end
#[derive(Clone)]
pub struct ReminderService {
    drafts: Arc<dyn SessionStore<ReminderDraft>>,
    sessions: Arc<dyn SessionStore<ManagementSession>>,
    locks: SenderLocks,
    extractor: Arc<ReminderExtractor>,
    calendar: Option<Arc<dyn EventStore>>,
    management: Option<Arc<ManagementMachine>>,
    channel: Arc<dyn MessageChannel>,
    projector: EventProjector,
    resolver: DateResolver,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    /// Build a service with in-memory session stores.
    ///
    /// `calendar: None` runs in degraded mode: reminders are acknowledged as
    /// not synced and list/manage requests are declined.
    pub fn new(
        extractor: Arc<ReminderExtractor>,
        calendar: Option<Arc<dyn EventStore>>,
        channel: Arc<dyn MessageChannel>,
        conversation: &ConversationConfig,
        tz: Tz,
    ) -> Self {
        let resolver = DateResolver::new(tz);
        let management = calendar.as_ref().map(|store| {
            Arc::new(ManagementMachine::new(
                store.clone(),
                extractor.clone(),
                resolver,
                conversation.delete_all_window_days,
            ))
        });

        Self {
            drafts: Arc::new(InMemorySessionStore::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            locks: SenderLocks::new(),
            extractor,
            calendar,
            management,
            channel,
            projector: EventProjector::new(tz.name()),
            resolver,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the session stores, e.g. with a persistent backend
    pub fn with_stores(
        mut self,
        drafts: Arc<dyn SessionStore<ReminderDraft>>,
        sessions: Arc<dyn SessionStore<ManagementSession>>,
    ) -> Self {
        self.drafts = drafts;
        self.sessions = sessions;
        self
    }

    /// Same state and collaborators, different outbound channel
    pub fn with_channel(&self, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            ..self.clone()
        }
    }

    pub fn timezone(&self) -> Tz {
        self.resolver.timezone()
    }

    pub fn resolver(&self) -> &DateResolver {
        &self.resolver
    }

    pub fn extractor(&self) -> &Arc<ReminderExtractor> {
        &self.extractor
    }

    pub fn calendar(&self) -> Option<&Arc<dyn EventStore>> {
        self.calendar.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.resolver.today(self.clock.now())
    }

    /// Handle one inbound text and send the reply.
    ///
    /// Messages from the same sender are handled one at a time. A panic while
    /// handling is logged and answered with a generic apology.
    pub async fn on_inbound_text(&self, sender: &str, text: &str, display_name: &str) {
        let _guard = self.locks.acquire(sender).await;
        tracing::info!(sender = %mask_sender(sender), chars = text.chars().count(), "Inbound message");

        let worker = {
            let this = self.clone();
            let (sender, text, name) = (sender.to_string(), text.to_string(), display_name.to_string());
            tokio::spawn(async move { this.process(&sender, &text, &name).await })
        };

        let reply = match worker.await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(sender = %mask_sender(sender), error = %e, "Message handler failed");
                format::apology(display_name)
            }
        };

        self.deliver(sender, &reply).await;
    }

    async fn deliver(&self, recipient: &str, text: &str) {
        if let Err(e) = self.channel.send(recipient, text).await {
            tracing::error!(recipient = %mask_sender(recipient), error = %e, "Failed to deliver reply");
        }
    }

    /// Route a message and build the reply. Never touches the channel.
    async fn process(&self, sender: &str, text: &str, name: &str) -> String {
        let now = self.clock.now();
        let text = text.trim();

        if let Some(session) = self.sessions.get(sender).await {
            match &self.management {
                Some(machine) => {
                    let outcome = machine.handle(session, text, name, now).await;
                    self.store_session(sender, outcome.next).await;
                    return outcome.reply;
                }
                None => {
                    self.sessions.delete(sender).await;
                }
            }
        }

        if let Some(intent) = detect_intent(text) {
            return match &self.management {
                Some(machine) => {
                    let outcome = machine.start(intent, text, name, now).await;
                    self.store_session(sender, outcome.next).await;
                    outcome.reply
                }
                None => format::management_unavailable(name),
            };
        }

        self.fill_draft(sender, text, name, now).await
    }

    async fn store_session(&self, sender: &str, next: Option<ManagementSession>) {
        match next {
            Some(session) => {
                tracing::debug!(sender = %mask_sender(sender), mode = session.mode(), "Management session stored");
                self.sessions.put(sender, session).await;
            }
            None => {
                self.sessions.delete(sender).await;
            }
        }
    }

    async fn fill_draft(&self, sender: &str, text: &str, name: &str, now: DateTime<Utc>) -> String {
        let prior = self.drafts.get(sender).await;

        let draft = match self.extractor.extract(text, prior.as_ref(), now).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(sender = %mask_sender(sender), error = %e, "Could not extract reminder");
                self.drafts.delete(sender).await;
                return format::guidance(name);
            }
        };

        let today = self.resolver.today(now);
        let missing = missing_fields(&draft);
        if let Some(question) = clarification_question(&missing, today) {
            tracing::info!(sender = %mask_sender(sender), missing = ?missing, "Reminder incomplete");
            let reply = format::clarification(name, &draft, &question);
            self.drafts.put(sender, draft).await;
            return reply;
        }

        self.drafts.delete(sender).await;

        let event = match self.projector.project(&draft, today) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(sender = %mask_sender(sender), error = %e, "Reminder discarded");
                return format::unsupported_recurrence(name, &draft);
            }
        };

        let outcome = match &self.calendar {
            None => CalendarOutcome::NotConfigured,
            Some(store) => match store.create(&event).await {
                Ok(created) => {
                    tracing::info!(event_id = %created.id, "Calendar event created");
                    CalendarOutcome::Created { link: created.link }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create calendar event");
                    CalendarOutcome::Failed
                }
            },
        };

        format::acknowledgement(name, &draft, &outcome)
    }

    /// Extract and project without storing or sending anything
    pub async fn parse(&self, text: &str) -> Result<ParseReport, ExtractionError> {
        let now = self.clock.now();
        let draft = self.extractor.extract(text, None, now).await?;
        let today = self.resolver.today(now);
        let missing = missing_fields(&draft);
        let question = clarification_question(&missing, today);

        let (event, projection_error) = if missing.is_empty() {
            match self.projector.project(&draft, today) {
                Ok(event) => (Some(event), None),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };

        Ok(ParseReport {
            draft,
            missing,
            question,
            event,
            projection_error,
        })
    }

    pub async fn snapshot(&self) -> ConversationsSnapshot {
        let drafts = self
            .drafts
            .entries()
            .await
            .into_iter()
            .map(|(sender, draft)| SenderDraft {
                missing: missing_fields(&draft),
                sender,
                draft,
            })
            .collect();
        let sessions = self
            .sessions
            .entries()
            .await
            .into_iter()
            .map(|(sender, session)| SenderSession { sender, session })
            .collect();
        ConversationsSnapshot { drafts, sessions }
    }

    /// Number of open drafts and management sessions
    pub async fn active_counts(&self) -> (usize, usize) {
        (self.drafts.len().await, self.sessions.len().await)
    }

    /// Forget everything stored for `sender`; returns whether anything was removed
    pub async fn clear(&self, sender: &str) -> bool {
        let _guard = self.locks.acquire(sender).await;
        let draft = self.drafts.delete(sender).await.is_some();
        let session = self.sessions.delete(sender).await.is_some();
        draft || session
    }

    /// Calendar events on one local date; `None` when no calendar is configured
    pub async fn reminders_on(&self, date: NaiveDate) -> Option<Result<Vec<CalendarEvent>, CalendarError>> {
        let store = self.calendar.as_ref()?;
        Some(store.list(&TimeRange::day(date, self.timezone())).await)
    }

    /// Draft currently held for `sender`
    pub async fn draft_for(&self, sender: &str) -> Option<ReminderDraft> {
        self.drafts.get(sender).await
    }

    /// Management session currently held for `sender`
    pub async fn session_for(&self, sender: &str) -> Option<ManagementSession> {
        self.sessions.get(sender).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::InMemoryEventStore;
    use crate::channel::RecordingChannel;
    use crate::llm::{GenerationOptions, LLMError, LLMProvider, Message};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn generate(&self, _: &[Message], _: GenerationOptions) -> crate::llm::Result<String> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(LLMError::ProviderUnavailable("script exhausted".to_string()));
            }
            Ok(replies.remove(0))
        }
    }

    fn tz() -> Tz {
        chrono_tz::Asia::Karachi
    }

    fn service(replies: &[&str], calendar: Option<InMemoryEventStore>) -> (ReminderService, RecordingChannel) {
        let provider = Arc::new(Scripted {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        });
        let extractor = Arc::new(ReminderExtractor::new(provider, tz(), 256));
        let channel = RecordingChannel::new();
        let calendar = calendar.map(|store| Arc::new(store) as Arc<dyn EventStore>);
        let service = ReminderService::new(
            extractor,
            calendar,
            Arc::new(channel.clone()),
            &ConversationConfig::default(),
            tz(),
        )
        .with_clock(Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 6, 10, 7, 0, 0).unwrap())));
        (service, channel)
    }

    const SENDER: &str = "923001234567";

    #[tokio::test]
    async fn test_complete_reminder_is_created() {
        let store = InMemoryEventStore::new(tz());
        let (service, channel) = service(
            &[r#"{"task": "call mom", "date": "2025-06-11", "time": "15:00", "recurrence": null}"#],
            Some(store.clone()),
        );

        service.on_inbound_text(SENDER, "call mom tomorrow at 3pm", "Sam").await;

        let replies = channel.texts_for(SENDER).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Reminder Set Successfully"));
        assert!(replies[0].contains("Link: memory://events/"));
        assert!(service.draft_for(SENDER).await.is_none());

        let events = store.all().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("call mom at 15:00"));
    }

    #[tokio::test]
    async fn test_clarification_keeps_draft_then_completes() {
        let (service, channel) = service(
            &[
                r#"{"task": "dentist", "date": "2025-06-11"}"#,
                r#"{"time": "10:00"}"#,
            ],
            None,
        );

        service.on_inbound_text(SENDER, "dentist tomorrow", "Sam").await;
        let draft = service.draft_for(SENDER).await.unwrap();
        assert_eq!(draft.task.as_deref(), Some("dentist"));

        service.on_inbound_text(SENDER, "10am", "Sam").await;
        assert!(service.draft_for(SENDER).await.is_none());

        let replies = channel.texts_for(SENDER).await;
        assert!(replies[0].contains("At what time should I remind you?"));
        assert!(replies[1].contains("Task: dentist"));
        assert!(replies[1].contains("Time: 10:00 AM"));
        assert!(replies[1].contains("Not configured"));
    }

    #[tokio::test]
    async fn test_extraction_failure_clears_draft_and_guides() {
        let (service, channel) = service(&[r#"{"task": "dentist", "date": "2025-06-11"}"#, "garbage"], None);

        service.on_inbound_text(SENDER, "dentist tomorrow", "Sam").await;
        service.on_inbound_text(SENDER, "???", "Sam").await;

        assert!(service.draft_for(SENDER).await.is_none());
        let replies = channel.texts_for(SENDER).await;
        assert!(replies[1].contains("Try examples like"));
    }

    #[tokio::test]
    async fn test_unparseable_time_keeps_draft_and_asks_again() {
        let (service, channel) = service(
            &[
                r#"{"task": "dentist", "date": "2025-06-11"}"#,
                r#"{"time": "3:00 PM"}"#,
            ],
            None,
        );

        service.on_inbound_text(SENDER, "dentist tomorrow", "Sam").await;
        service.on_inbound_text(SENDER, "at 3", "Sam").await;

        let draft = service.draft_for(SENDER).await.unwrap();
        assert_eq!(draft.task.as_deref(), Some("dentist"));
        assert!(draft.time.is_none());

        let replies = channel.texts_for(SENDER).await;
        assert_eq!(replies.len(), 2);
        assert!(replies[1].contains("At what time should I remind you?"));
    }

    #[tokio::test]
    async fn test_unknown_recurrence_gets_unsupported_reply() {
        let store = InMemoryEventStore::new(tz());
        let (service, channel) = service(
            &[r#"{"task": "standup", "time": "10:00", "recurrence": "weekdays"}"#],
            Some(store.clone()),
        );

        service.on_inbound_text(SENDER, "standup every weekday at 10", "Sam").await;

        let replies = channel.texts_for(SENDER).await;
        assert!(replies[0].contains("can't set up a 'custom' repeat"));
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_recurrence_is_rejected() {
        let store = InMemoryEventStore::new(tz());
        let (service, channel) = service(
            &[r#"{"task": "water plants", "recurrence": "custom"}"#],
            Some(store.clone()),
        );

        service.on_inbound_text(SENDER, "water plants every other day", "Sam").await;

        let replies = channel.texts_for(SENDER).await;
        assert!(replies[0].contains("can't set up a 'custom' repeat"));
        assert!(store.all().await.is_empty());
        assert!(service.draft_for(SENDER).await.is_none());
    }

    #[tokio::test]
    async fn test_list_request_without_calendar_is_declined() {
        let (service, channel) = service(&[], None);
        service.on_inbound_text(SENDER, "show my reminders for today", "Sam").await;

        let replies = channel.texts_for(SENDER).await;
        assert!(replies[0].contains("Calendar is not configured"));
        assert!(service.session_for(SENDER).await.is_none());
    }

    #[tokio::test]
    async fn test_session_is_checked_before_drafts() {
        let store = InMemoryEventStore::new(tz());
        let at = sdk::types::EventTime::timed(
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap().and_hms_opt(18, 0, 0).unwrap(),
            "Asia/Karachi",
        );
        store
            .create(&NewEvent {
                summary: "gym".to_string(),
                description: None,
                start: at.clone(),
                end: at,
                recurrence: vec![],
            })
            .await
            .unwrap();
        let (service, channel) = service(&[], Some(store));

        service.on_inbound_text(SENDER, "list my reminders", "Sam").await;
        assert_eq!(service.session_for(SENDER).await.unwrap().mode(), "listing");

        // "1" would be nonsense to the extractor; the session handles it
        service.on_inbound_text(SENDER, "1", "Sam").await;
        assert_eq!(service.session_for(SENDER).await.unwrap().mode(), "action_selected");

        service.on_inbound_text(SENDER, "cancel", "Sam").await;
        assert!(service.session_for(SENDER).await.is_none());

        let replies = channel.texts_for(SENDER).await;
        assert_eq!(replies.len(), 3);
        assert!(replies[1].contains("Task: gym"));
    }

    #[tokio::test]
    async fn test_clear_and_snapshot() {
        let (service, _) = service(&[r#"{"task": "dentist"}"#], None);
        service.on_inbound_text(SENDER, "dentist", "Sam").await;

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.drafts.len(), 1);
        assert_eq!(snapshot.drafts[0].missing, vec![MissingField::Date]);
        assert_eq!(service.active_counts().await, (1, 0));

        assert!(service.clear(SENDER).await);
        assert!(!service.clear(SENDER).await);
    }

    #[tokio::test]
    async fn test_parse_has_no_side_effects() {
        let store = InMemoryEventStore::new(tz());
        let (service, channel) = service(
            &[r#"{"task": "take medicine", "time": "08:00", "recurrence": "daily"}"#],
            Some(store.clone()),
        );

        let report = service.parse("take medicine daily at 8am").await.unwrap();
        assert!(report.missing.is_empty());
        let event = report.event.unwrap();
        assert_eq!(event.recurrence, vec!["RRULE:FREQ=DAILY".to_string()]);
        assert!(store.all().await.is_empty());
        assert!(channel.sent().await.is_empty());
    }
}
