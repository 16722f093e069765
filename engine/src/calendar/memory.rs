use super::{event_time_in, CalendarError, EventStore, Result, TimeRange};
use async_trait::async_trait;
use chrono_tz::Tz;
use sdk::types::{CalendarEvent, CreatedEvent, EventPatch, NewEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local event store.
///
/// Backs `nudge simulate --offline` and the test suite. Events are kept in
/// insertion order; `list` sorts by start time like the real backend does.
#[derive(Clone)]
pub struct InMemoryEventStore {
    tz: Tz,
    events: Arc<Mutex<Vec<CalendarEvent>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            events: Arc::new(Mutex::new(Vec::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed an event verbatim
    pub async fn insert(&self, event: CalendarEvent) {
        self.events.lock().await.push(event);
    }

    /// Snapshot of every stored event
    pub async fn all(&self) -> Vec<CalendarEvent> {
        self.events.lock().await.clone()
    }

    /// Make create/update/delete fail with an API error until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CalendarError::Api {
                status: 503,
                body: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>> {
        let events = self.events.lock().await;
        let mut matching: Vec<(chrono::DateTime<Tz>, CalendarEvent)> = events
            .iter()
            .filter_map(|event| {
                let start = event.start.as_ref().and_then(|s| event_time_in(s, self.tz))?;
                range.contains(&start).then(|| (start, event.clone()))
            })
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(matching
            .into_iter()
            .map(|(_, event)| event)
            .take(range.max_results as usize)
            .collect())
    }

    async fn create(&self, event: &NewEvent) -> Result<CreatedEvent> {
        self.check_writable()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let link = format!("memory://events/{}", id);
        self.events.lock().await.push(CalendarEvent {
            id: id.clone(),
            summary: Some(event.summary.clone()),
            description: event.description.clone(),
            start: Some(event.start.clone()),
            end: Some(event.end.clone()),
            recurrence: event.recurrence.clone(),
            html_link: Some(link.clone()),
        });
        Ok(CreatedEvent {
            id,
            link: Some(link),
        })
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
        self.check_writable()?;
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))?;
        event.apply(patch);
        Ok(event.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(CalendarError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<CalendarEvent> {
        self.events
            .lock()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sdk::types::EventTime;

    fn tz() -> Tz {
        "Asia/Karachi".parse().unwrap()
    }

    fn new_event(summary: &str, day: u32, hour: u32) -> NewEvent {
        let at = NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        NewEvent {
            summary: summary.to_string(),
            description: None,
            start: EventTime::timed(at, "Asia/Karachi"),
            end: EventTime::timed(at, "Asia/Karachi"),
            recurrence: vec![],
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let store = InMemoryEventStore::new(tz());
        store.create(&new_event("late", 11, 18)).await.unwrap();
        store.create(&new_event("other day", 12, 9)).await.unwrap();
        store.create(&new_event("early", 11, 8)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let listed = store.list(&TimeRange::day(day, tz())).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.summary_text()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryEventStore::new(tz());
        let created = store.create(&new_event("gym", 11, 7)).await.unwrap();

        let patch = EventPatch {
            summary: Some("yoga".to_string()),
            ..Default::default()
        };
        let updated = store.update(&created.id, &patch).await.unwrap();
        assert_eq!(updated.summary_text(), "yoga");

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get(&created.id).await,
            Err(CalendarError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&created.id).await,
            Err(CalendarError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = InMemoryEventStore::new(tz());
        store.set_fail_writes(true);
        assert!(store.create(&new_event("x", 11, 7)).await.is_err());
        assert!(store.all().await.is_empty());
    }
}
