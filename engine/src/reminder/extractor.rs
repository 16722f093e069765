//! Reminder and edit-intent extraction
//!
//! Wraps an [`LLMProvider`] with the two prompts the conversation needs and
//! treats whatever comes back as untrusted text: the JSON object is recovered
//! with [`extract_json_object`], every field is validated, and failures are
//! reported as [`ExtractionError`] values rather than guessed around.

use super::draft::{DraftUpdate, Recurrence, ReminderDraft, ReminderTime};
use crate::llm::{extract_json_object, GenerationOptions, LLMError, LLMProvider, Message};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use sdk::types::{CalendarEvent, EventPatch};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Phrases meaning "no specific time", matched as lowercase substrings
pub const SKIP_TIME_PHRASES: &[&str] = &[
    "no time",
    "all day",
    "whole day",
    "entire day",
    "skip time",
    "no specific time",
];

/// Why an utterance could not be turned into a draft or patch
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extractor unavailable: {0}")]
    NoResponse(#[from] LLMError),

    #[error("extractor returned an empty response")]
    EmptyResponse,

    #[error("extractor returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

impl From<ExtractionError> for sdk::EngineError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::NoResponse(inner) => inner.into(),
            other => Self::LLMProvider(other.to_string()),
        }
    }
}

/// True when the utterance asks for an all-day reminder
pub fn wants_skip_time(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    SKIP_TIME_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Turns utterances into drafts and edit instructions into patches
pub struct ReminderExtractor {
    provider: Arc<dyn LLMProvider>,
    tz: Tz,
    edit_max_output_tokens: u32,
}

impl ReminderExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, tz: Tz, edit_max_output_tokens: u32) -> Self {
        Self {
            provider,
            tz,
            edit_max_output_tokens,
        }
    }

    /// Provider behind this extractor
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Extract a draft from `utterance`, merged over `prior`
    pub async fn extract(
        &self,
        utterance: &str,
        prior: Option<&ReminderDraft>,
        now: DateTime<Utc>,
    ) -> Result<ReminderDraft, ExtractionError> {
        let skipping_time = wants_skip_time(utterance);
        let prompt = self.extraction_prompt(utterance, prior, now, skipping_time);

        let raw = self
            .provider
            .generate(&[Message::user(prompt)], GenerationOptions::default())
            .await
            .map_err(|e| match e {
                LLMError::EmptyResponse => ExtractionError::EmptyResponse,
                other => ExtractionError::NoResponse(other),
            })?;
        tracing::debug!(raw = %raw, "Extractor raw response");

        let mut update = parse_draft_update(&raw)?;
        if skipping_time {
            update.time = Some(ReminderTime::Skip);
        }

        let draft = ReminderDraft::merged(prior, update);
        tracing::debug!(task = ?draft.task_text(), recurrence = %draft.recurrence, "Parsed reminder draft");
        Ok(draft)
    }

    /// Extract the fields an edit instruction changes on `event`
    pub async fn edit_intent(
        &self,
        instruction: &str,
        event: &CalendarEvent,
        now: DateTime<Utc>,
    ) -> Result<EventPatch, ExtractionError> {
        let prompt = self.edit_prompt(instruction, event, now);

        let raw = self
            .provider
            .generate(
                &[Message::user(prompt)],
                GenerationOptions::with_max_output_tokens(self.edit_max_output_tokens),
            )
            .await
            .map_err(|e| match e {
                LLMError::EmptyResponse => ExtractionError::EmptyResponse,
                other => ExtractionError::NoResponse(other),
            })?;
        tracing::debug!(raw = %raw, "Edit extractor raw response");

        parse_event_patch(&raw)
    }

    fn extraction_prompt(
        &self,
        utterance: &str,
        prior: Option<&ReminderDraft>,
        now: DateTime<Utc>,
        skipping_time: bool,
    ) -> String {
        let local = now.with_timezone(&self.tz);
        let today = local.date_naive();
        let existing = prior
            .and_then(|draft| serde_json::to_string_pretty(draft).ok())
            .map(|json| format!("\nExisting reminder data:\n{}\n", json))
            .unwrap_or_default();

        format!(
            r#"You are a reminder extraction assistant. Extract reminder information and return ONLY a valid JSON object.

Context:
- Today is {weekday}, {today}
- Current time: {time}
- User timezone: {tz}
- User wants to skip time: {skipping}
{existing}
User input: "{utterance}"

Return a JSON object with these fields:
{{
  "task": "description of the task or null",
  "date": "YYYY-MM-DD format or null",
  "time": "HH:MM in 24-hour format or null",
  "recurrence": "hourly/daily/weekly/monthly/yearly/custom or null",
  "day_of_week": "Monday/Tuesday/etc or null",
  "notes": "any extra context or null"
}}

Rules:
1. 'tomorrow' = {tomorrow}
2. 'today' = {today}
3. Convert times to 24-hour format (3pm = 15:00, 2:30pm = 14:30)
4. For 'next week', use approximate date: {next_week}
5. For recurring tasks (every X), set recurrence field appropriately
6. If existing data is provided, merge the new information with it
7. Return ONLY the JSON object, no markdown, no explanation, no extra text.
8. If user wants to skip time, set time to "skip" to indicate all-day reminder
"#,
            weekday = local.format("%A"),
            today = today.format("%Y-%m-%d"),
            time = local.format("%H:%M"),
            tz = self.tz.name(),
            skipping = skipping_time,
            existing = existing,
            utterance = utterance,
            tomorrow = (today + Duration::days(1)).format("%Y-%m-%d"),
            next_week = (today + Duration::weeks(1)).format("%Y-%m-%d"),
        )
    }

    fn edit_prompt(&self, instruction: &str, event: &CalendarEvent, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.tz);
        let today = local.date_naive();
        let start = event
            .start
            .as_ref()
            .and_then(|s| serde_json::to_string(s).ok())
            .unwrap_or_else(|| "{}".to_string());
        let tz = self.tz.name();

        format!(
            r#"You are helping to edit a calendar reminder. The user wants to modify an existing event.

Current Event:
- Summary: "{summary}"
- Start: {start}

User's edit instruction: "{instruction}"

Context:
- Today is {weekday}, {today}
- Current time: {time}
- User timezone: {tz}

Return ONLY a JSON object with the fields that should be updated. Only include fields that are being changed.

Possible fields to update:
{{
  "summary": "new task name",
  "start": {{"dateTime": "YYYY-MM-DDTHH:MM:SS", "timeZone": "{tz}"}},
  "end": {{"dateTime": "YYYY-MM-DDTHH:MM:SS", "timeZone": "{tz}"}},
  "recurrence": ["RRULE:FREQ=DAILY"]
}}

For all-day events use:
"start": {{"date": "YYYY-MM-DD"}}
"end": {{"date": "YYYY-MM-DD"}}

Rules:
1. Only include fields that are being changed
2. If changing time, include both start and end
3. For date changes: 'tomorrow' = {tomorrow}
4. Convert times to 24-hour format with timezone
5. Return ONLY the JSON object, no explanation
"#,
            summary = event.summary_text(),
            start = start,
            instruction = instruction,
            weekday = local.format("%A"),
            today = today.format("%Y-%m-%d"),
            time = local.format("%H:%M"),
            tz = tz,
            tomorrow = (today + Duration::days(1)).format("%Y-%m-%d"),
        )
    }
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    if raw.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    let json = extract_json_object(raw)
        .ok_or_else(|| ExtractionError::MalformedJson("no JSON object in response".to_string()))?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExtractionError::MalformedJson("expected a JSON object".to_string())),
        Err(e) => Err(ExtractionError::MalformedJson(e.to_string())),
    }
}

/// Text value of a field; null, blank and the literal "null" count as absent
fn text_field(map: &Map<String, Value>, key: &'static str) -> Result<Option<String>, ExtractionError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Some(other) => Err(ExtractionError::InvalidField {
            field: key,
            value: other.to_string(),
        }),
    }
}

/// Validate model output into a [`DraftUpdate`]
pub fn parse_draft_update(raw: &str) -> Result<DraftUpdate, ExtractionError> {
    let map = parse_object(raw)?;

    let task = match text_field(&map, "task")? {
        Some(task) => Some(task),
        None => text_field(&map, "title")?,
    };

    let date = text_field(&map, "date")?
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| ExtractionError::InvalidDate(d)))
        .transpose()?;

    let time = text_field(&map, "time")?.and_then(|t| {
        let parsed = ReminderTime::parse(&t);
        if parsed.is_none() {
            tracing::warn!(value = %t, "Ignoring unparseable time from extractor");
        }
        parsed
    });

    // Unknown repeat values are kept as Custom so projection can refuse them
    let recurrence = text_field(&map, "recurrence")?.map(|r| {
        r.parse::<Recurrence>().unwrap_or_else(|_| {
            tracing::warn!(value = %r, "Unrecognized recurrence from extractor");
            Recurrence::Custom
        })
    });

    Ok(DraftUpdate {
        task,
        date,
        time,
        recurrence,
        day_of_week: text_field(&map, "day_of_week")?,
        notes: text_field(&map, "notes")?,
    })
}

/// Validate model output into a normalized [`EventPatch`]
pub fn parse_event_patch(raw: &str) -> Result<EventPatch, ExtractionError> {
    let map = parse_object(raw)?;
    let patch: EventPatch = serde_json::from_value(Value::Object(map))
        .map_err(|e| ExtractionError::MalformedJson(e.to_string()))?;
    let patch = patch.normalized();
    if patch.is_empty() {
        return Err(ExtractionError::InvalidField {
            field: "patch",
            value: "no changes".to_string(),
        });
    }
    Ok(patch)
}
