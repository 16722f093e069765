//! Google Calendar store against mock token and events endpoints

use chrono::NaiveDate;
use nudge_engine::calendar::{oauth, CalendarError, EventStore, GoogleCalendarStore, TimeRange};
use nudge_engine::config::CalendarConfig;
use nudge_engine::secrets::SecretString;
use sdk::types::{EventPatch, EventTime, NewEvent};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENTS: &str = "/calendar/v3/calendars/primary/events";

fn store(server: &MockServer) -> GoogleCalendarStore {
    let config = CalendarConfig {
        base_url: format!("{}/calendar/v3", server.uri()),
        token_url: format!("{}/token", server.uri()),
        ..CalendarConfig::default()
    };
    GoogleCalendarStore::new(
        config,
        SecretString::new("client-id"),
        SecretString::new("client-secret"),
        SecretString::new("refresh-token"),
        Duration::from_secs(5),
    )
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn karachi() -> chrono_tz::Tz {
    chrono_tz::Asia::Karachi
}

#[tokio::test]
async fn test_list_day_sends_window_and_caches_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(EVENTS))
        .and(header("authorization", "Bearer access-1"))
        .and(query_param("timeMin", "2025-06-11T00:00:00+05:00"))
        .and(query_param("timeMax", "2025-06-11T23:59:59+05:00"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "calendar#events",
            "items": [
                {
                    "id": "a1",
                    "summary": "call mom at 15:00",
                    "start": {"dateTime": "2025-06-11T15:00:00+05:00", "timeZone": "Asia/Karachi"},
                    "end": {"dateTime": "2025-06-11T15:00:00+05:00", "timeZone": "Asia/Karachi"},
                    "htmlLink": "https://calendar.example/a1"
                },
                {
                    "id": "a2",
                    "summary": "visa renewal",
                    "start": {"date": "2025-06-11"},
                    "end": {"date": "2025-06-11"}
                }
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let store = store(&server);
    let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
    let range = TimeRange::day(date, karachi());

    let events = store.list(&range).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].html_link.as_deref(), Some("https://calendar.example/a1"));
    assert_eq!(events[1].start, Some(EventTime::all_day(date)));

    // Second call reuses the cached access token
    store.list(&range).await.unwrap();
}

#[tokio::test]
async fn test_list_is_capped_by_configured_max_results() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(EVENTS))
        .and(query_param("maxResults", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let first = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let last = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
    let range = TimeRange::days(first, last, karachi()).with_max_results(500);
    assert!(store(&server).list(&range).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_posts_event_and_returns_link() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({
            "summary": "take medicine at 08:00",
            "start": {"dateTime": "2025-06-11T08:00:00", "timeZone": "Asia/Karachi"},
            "end": {"dateTime": "2025-06-11T08:00:00", "timeZone": "Asia/Karachi"},
            "recurrence": ["RRULE:FREQ=DAILY"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new1",
            "status": "confirmed",
            "htmlLink": "https://calendar.example/new1",
            "summary": "take medicine at 08:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let at = NaiveDate::from_ymd_opt(2025, 6, 11)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let event = NewEvent {
        summary: "take medicine at 08:00".to_string(),
        description: None,
        start: EventTime::timed(at, "Asia/Karachi"),
        end: EventTime::timed(at, "Asia/Karachi"),
        recurrence: vec!["RRULE:FREQ=DAILY".to_string()],
    };

    let created = store(&server).create(&event).await.unwrap();
    assert_eq!(created.id, "new1");
    assert_eq!(created.link.as_deref(), Some("https://calendar.example/new1"));
}

#[tokio::test]
async fn test_update_patches_only_changed_fields() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/evt9", EVENTS)))
        .and(body_partial_json(json!({"summary": "call dad"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt9",
            "summary": "call dad",
            "start": {"date": "2025-06-12"},
            "end": {"date": "2025-06-12"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let patch = EventPatch {
        summary: Some("call dad".to_string()),
        ..Default::default()
    };
    let updated = store(&server).update("evt9", &patch).await.unwrap();
    assert_eq!(updated.summary.as_deref(), Some("call dad"));

    let requests = server.received_requests().await.unwrap();
    let patch_request = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&patch_request.body).unwrap();
    assert_eq!(body, json!({"summary": "call dad"}));
}

#[tokio::test]
async fn test_delete_missing_event_is_not_found() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/gone", EVENTS)))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/here", EVENTS)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let store = store(&server);
    match store.delete("gone").await {
        Err(CalendarError::NotFound(id)) => assert_eq!(id, "gone"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    store.delete("here").await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_drops_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt1", EVENTS)))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let store = store(&server);
    for _ in 0..2 {
        let err = store.get("evt1").await.unwrap_err();
        assert!(matches!(err, CalendarError::AuthenticationFailed(_)));
    }
}

#[tokio::test]
async fn test_failed_refresh_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(&server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
    let err = store(&server)
        .list(&TimeRange::day(date, karachi()))
        .await
        .unwrap_err();
    match err {
        CalendarError::AuthenticationFailed(message) => assert!(message.contains("invalid_grant")),
        other => panic!("expected AuthenticationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
    let event = NewEvent {
        summary: "dentist".to_string(),
        description: None,
        start: EventTime::all_day(date),
        end: EventTime::all_day(date),
        recurrence: vec![],
    };
    match store(&server).create(&event).await {
        Err(CalendarError::Api { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "backend unavailable");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_calendar_summary_names_the_account() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "calendar#calendar",
            "id": "ayesha@example.com",
            "summary": "ayesha@example.com",
            "timeZone": "Asia/Karachi"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).calendar_summary().await.unwrap(), "ayesha@example.com");
}

#[tokio::test]
async fn test_exchange_code_returns_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2F0Abc"))
        .and(body_string_contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8765"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "expires_in": 3599,
            "refresh_token": "1//refresh-new",
            "scope": oauth::CALENDAR_SCOPE,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = oauth::exchange_code(
        &reqwest::Client::new(),
        &format!("{}/token", server.uri()),
        &SecretString::new("client-id"),
        &SecretString::new("client-secret"),
        "4/0Abc",
        "http://127.0.0.1:8765",
    )
    .await
    .unwrap();
    assert_eq!(token.expose(), "1//refresh-new");
}

#[tokio::test]
async fn test_exchange_without_refresh_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let err = oauth::exchange_code(
        &reqwest::Client::new(),
        &format!("{}/token", server.uri()),
        &SecretString::new("client-id"),
        &SecretString::new("client-secret"),
        "code",
        "http://127.0.0.1:8765",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CalendarError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_redirect_listener_hands_back_code() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let waiting = tokio::spawn(oauth::receive_code(listener));

    let body = reqwest::get(format!("http://{}/?code=4%2F0Abc&scope=calendar", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("authorized"));
    assert_eq!(waiting.await.unwrap().unwrap(), "4/0Abc");
}

#[tokio::test]
async fn test_redirect_listener_reports_denied_consent() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let waiting = tokio::spawn(oauth::receive_code(listener));

    reqwest::get(format!("http://{}/?error=access_denied", addr))
        .await
        .unwrap();
    match waiting.await.unwrap() {
        Err(CalendarError::AuthenticationFailed(message)) => assert!(message.contains("access_denied")),
        other => panic!("expected AuthenticationFailed, got {:?}", other),
    }
}
