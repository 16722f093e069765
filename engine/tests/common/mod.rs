//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use nudge_engine::calendar::{EventStore, InMemoryEventStore};
use nudge_engine::channel::RecordingChannel;
use nudge_engine::config::ConversationConfig;
use nudge_engine::llm::{GenerationOptions, LLMError, LLMProvider, Message};
use nudge_engine::reminder::{FixedClock, ReminderExtractor, ReminderService};
use sdk::types::{CalendarEvent, EventTime};
use std::sync::{Arc, Mutex};

pub const SENDER: &str = "923001234567";

pub fn karachi() -> Tz {
    chrono_tz::Asia::Karachi
}

/// Tuesday 2025-06-10, 12:00 in Karachi
pub fn tuesday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 7, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Provider that replays canned replies in order and records prompts
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, messages: &[Message], _: GenerationOptions) -> nudge_engine::llm::Result<String> {
        if let Some(message) = messages.last() {
            self.prompts.lock().unwrap().push(message.content.clone());
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(LLMError::ProviderUnavailable("no scripted reply left".to_string()));
        }
        Ok(replies.remove(0))
    }
}

pub struct Harness {
    pub service: ReminderService,
    pub provider: Arc<ScriptedProvider>,
    pub calendar: Option<InMemoryEventStore>,
    pub channel: RecordingChannel,
}

impl Harness {
    pub fn new(with_calendar: bool) -> Self {
        let provider = ScriptedProvider::new(&[]);
        let extractor = Arc::new(ReminderExtractor::new(provider.clone(), karachi(), 300));
        let calendar = with_calendar.then(|| InMemoryEventStore::new(karachi()));
        let channel = RecordingChannel::new();
        let service = ReminderService::new(
            extractor,
            calendar.clone().map(|c| Arc::new(c) as Arc<dyn EventStore>),
            Arc::new(channel.clone()),
            &ConversationConfig::default(),
            karachi(),
        )
        .with_clock(Arc::new(FixedClock(tuesday_noon())));

        Self {
            service,
            provider,
            calendar,
            channel,
        }
    }

    /// Send `text` as [`SENDER`] and return the single reply
    pub async fn say(&self, text: &str) -> String {
        self.channel.take().await;
        self.service.on_inbound_text(SENDER, text, "Ayesha").await;
        let mut sent = self.channel.take().await;
        assert_eq!(sent.len(), 1, "expected exactly one reply to {:?}", text);
        sent.remove(0).text
    }

    pub fn store(&self) -> &InMemoryEventStore {
        self.calendar.as_ref().expect("harness built without a calendar")
    }
}

pub fn timed_event(id: &str, summary: &str, date_time: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        description: None,
        start: Some(EventTime::Timed {
            date_time: date_time.to_string(),
            time_zone: None,
        }),
        end: Some(EventTime::Timed {
            date_time: date_time.to_string(),
            time_zone: None,
        }),
        recurrence: vec![],
        html_link: None,
    }
}
