//! Google Calendar v3 REST client
//!
//! Authenticates with a long-lived OAuth2 refresh token. Access tokens are
//! cached in memory and refreshed shortly before they expire.

use super::{CalendarError, EventStore, Result, TimeRange};
use crate::config::CalendarConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use sdk::types::{CalendarEvent, CreatedEvent, EventPatch, NewEvent};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh this long before the reported expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct CalendarInfo {
    id: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

/// OAuth2 refresh-token flow with an in-memory access token cache
pub struct GoogleAuth {
    token_url: String,
    client_id: SecretString,
    client_secret: SecretString,
    refresh_token: SecretString,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(
        token_url: impl Into<String>,
        client_id: SecretString,
        client_secret: SecretString,
        refresh_token: SecretString,
        client: reqwest::Client,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id,
            client_secret,
            refresh_token,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, refreshing when missing or about to expire
    pub async fn access_token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        tracing::debug!("Refreshing calendar access token");
        let params = [
            ("client_id", self.client_id.expose()),
            ("client_secret", self.client_secret.expose()),
            ("refresh_token", self.refresh_token.expose()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::AuthenticationFailed(format!(
                "token refresh failed ({}): {}",
                status,
                crate::secrets::scrub(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
        let secret = SecretString::new(token.access_token);
        *cached = Some(CachedToken {
            token: secret.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(secret)
    }

    /// Forget the cached token so the next call refreshes
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// [`EventStore`] over the Google Calendar `events` collection
pub struct GoogleCalendarStore {
    config: CalendarConfig,
    auth: GoogleAuth,
    client: reqwest::Client,
}

impl GoogleCalendarStore {
    /// Build a store sharing one HTTP client between auth and data calls
    pub fn new(
        config: CalendarConfig,
        client_id: SecretString,
        client_secret: SecretString,
        refresh_token: SecretString,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let auth = GoogleAuth::new(
            config.token_url.clone(),
            client_id,
            client_secret,
            refresh_token,
            client.clone(),
        );
        Self {
            config,
            auth,
            client,
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.base_url.trim_end_matches('/'),
            self.config.calendar_id
        )
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), id)
    }

    /// Title of the configured calendar. For `primary` this is the account's email.
    pub async fn calendar_summary(&self) -> Result<String> {
        let url = format!(
            "{}/calendars/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.calendar_id
        );
        let response = self.send(self.client.get(url), None).await?;
        let info: CalendarInfo = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        Ok(info.summary.unwrap_or(info.id))
    }

    async fn send(&self, request: reqwest::RequestBuilder, id: Option<&str>) -> Result<reqwest::Response> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 | 410 => CalendarError::NotFound(id.unwrap_or_default().to_string()),
            401 | 403 => {
                self.auth.invalidate().await;
                CalendarError::AuthenticationFailed(crate::secrets::scrub(&body))
            }
            code => CalendarError::Api {
                status: code,
                body: crate::secrets::scrub(&body),
            },
        })
    }
}

#[async_trait]
impl EventStore for GoogleCalendarStore {
    fn name(&self) -> &str {
        "google"
    }

    async fn list(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>> {
        let max_results = range.max_results.min(self.config.max_results).to_string();
        let query = [
            ("timeMin", range.start.to_rfc3339()),
            ("timeMax", range.end.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", max_results),
        ];
        let request = self.client.get(self.events_url()).query(&query);
        let response = self.send(request, None).await?;
        let list: EventList = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        tracing::debug!(count = list.items.len(), "Fetched calendar events");
        Ok(list.items)
    }

    async fn create(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let request = self.client.post(self.events_url()).json(event);
        let response = self.send(request, None).await?;
        let created: CalendarEvent = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        tracing::info!(event_id = %created.id, "Calendar event created");
        Ok(CreatedEvent {
            id: created.id,
            link: created.html_link,
        })
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
        let request = self.client.patch(self.event_url(id)).json(patch);
        let response = self.send(request, Some(id)).await?;
        let updated: CalendarEvent = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        tracing::info!(event_id = %id, "Calendar event updated");
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.event_url(id));
        self.send(request, Some(id)).await?;
        tracing::info!(event_id = %id, "Calendar event deleted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<CalendarEvent> {
        let request = self.client.get(self.event_url(id));
        let response = self.send(request, Some(id)).await?;
        response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))
    }
}
