//! HTTP surface
//!
//! # Endpoints
//!
//! - GET /webhook - WhatsApp subscription verification
//! - POST /webhook - inbound message delivery
//! - GET /health - liveness and collaborator status
//! - GET /admin/conversations - open drafts and management sessions
//! - POST /admin/conversations/clear?sender= - forget one sender
//! - GET /admin/reminders?date=YYYY-MM-DD - calendar events for a day
//! - POST /admin/simulate - run a message through the pipeline, capture replies
//! - POST /admin/parse - extraction only, no side effects
//!
//! Admin routes exist only when `server.admin_enabled` is set and require a
//! bearer token whenever an admin token is configured. Without a token they
//! may only be served on a loopback address.

use crate::channel::webhook::{WebhookPayload, DEFAULT_DISPLAY_NAME};
use crate::channel::RecordingChannel;
use crate::reminder::format;
use crate::reminder::ReminderService;
use crate::secrets::SecretString;
use crate::telemetry::mask_sender;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use sdk::EngineError;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: ReminderService,
    pub verify_token: Option<Arc<SecretString>>,
    pub admin_token: Option<Arc<SecretString>>,
    pub admin_enabled: bool,
}

impl AppState {
    pub fn new(service: ReminderService) -> Self {
        Self {
            service,
            verify_token: None,
            admin_token: None,
            admin_enabled: false,
        }
    }

    pub fn with_verify_token(mut self, token: Option<SecretString>) -> Self {
        self.verify_token = token.map(Arc::new);
        self
    }

    pub fn with_admin(mut self, enabled: bool, token: Option<SecretString>) -> Self {
        self.admin_enabled = enabled;
        self.admin_token = token.map(Arc::new);
        self
    }
}

/// Build the router for `state`
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/webhook", get(verify_handler).post(webhook_handler))
        .route("/health", get(health_handler));

    if state.admin_enabled {
        app = app
            .route("/admin/conversations", get(conversations_handler))
            .route("/admin/conversations/clear", post(clear_handler))
            .route("/admin/reminders", get(reminders_handler))
            .route("/admin/simulate", post(simulate_handler))
            .route("/admin/parse", post(parse_handler));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn is_loopback_bind(bind: &str) -> bool {
    match bind.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().is_loopback(),
        Err(_) => bind
            .rsplit_once(':')
            .map_or(bind, |(host, _)| host)
            .eq_ignore_ascii_case("localhost"),
    }
}

/// Refuse unauthenticated admin routes on an address other hosts can reach
pub fn check_admin_exposure(bind: &str, admin_enabled: bool, has_token: bool) -> Result<(), EngineError> {
    if admin_enabled && !has_token && !is_loopback_bind(bind) {
        return Err(EngineError::Config(format!(
            "Admin routes on {} need an admin token; set admin_token or disable server.admin_enabled",
            bind
        )));
    }
    Ok(())
}

/// Bind `bind` and serve until Ctrl-C or SIGTERM
pub async fn serve(bind: &str, state: AppState) -> Result<(), EngineError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| EngineError::Network(format!("Failed to bind {}: {}", bind, e)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EngineError::Network(format!("Server error: {}", e)))?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_handler(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    let token_ok = match (&state.verify_token, query.verify_token.as_deref()) {
        (Some(expected), Some(presented)) => expected.matches(presented),
        _ => false,
    };

    if query.mode.as_deref() == Some("subscribe") && token_ok {
        tracing::info!("Webhook verified");
        (StatusCode::OK, query.challenge.unwrap_or_default()).into_response()
    } else {
        tracing::warn!("Webhook verification rejected");
        (StatusCode::FORBIDDEN, "Forbidden").into_response()
    }
}

async fn webhook_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed webhook payload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Malformed JSON payload");
        }
    };

    for inbound in payload.inbound_texts() {
        let service = state.service.clone();
        tracing::debug!(sender = %mask_sender(&inbound.sender), "Dispatching inbound text");
        tokio::spawn(async move {
            service
                .on_inbound_text(&inbound.sender, &inbound.text, &inbound.display_name)
                .await;
        });
    }

    Json(json!({ "status": "success" })).into_response()
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let service = &state.service;
    let (conversations, sessions) = service.active_counts().await;
    let provider = service.extractor().provider();

    Json(json!({
        "status": "healthy",
        "calendar_available": service.calendar().is_some(),
        "calendar_backend": service.calendar().map(|c| c.name().to_string()),
        "provider": provider.name(),
        "model": provider.model(),
        "timezone": service.timezone().name(),
        "active_conversations": conversations,
        "management_sessions": sessions,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Check the admin bearer token when one is configured
#[allow(clippy::result_large_err)]
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.admin_token.as_ref() else {
        return Ok(());
    };

    let presented = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

    if expected.matches(presented) {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "Invalid admin token"))
    }
}

async fn conversations_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    Json(state.service.snapshot().await).into_response()
}

#[derive(Debug, Deserialize)]
struct ClearQuery {
    sender: String,
}

async fn clear_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ClearQuery>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let cleared = state.service.clear(&query.sender).await;
    tracing::info!(sender = %mask_sender(&query.sender), cleared, "Conversation cleared by admin");
    Json(json!({ "sender": query.sender, "cleared": cleared })).into_response()
}

#[derive(Debug, Deserialize)]
struct RemindersQuery {
    date: Option<String>,
}

async fn reminders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RemindersQuery>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let today = state.service.today();
    let date = match query.date.as_deref() {
        None => today,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid date '{}'", raw));
            }
        },
    };

    let tz = state.service.timezone();
    match state.service.reminders_on(date).await {
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Calendar not configured"),
        Some(Err(e)) => {
            tracing::error!("Failed to list reminders: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
        Some(Ok(events)) => {
            let reminders: Vec<serde_json::Value> = events
                .iter()
                .map(|event| {
                    json!({
                        "id": event.id,
                        "summary": event.summary_text(),
                        "start": event.start,
                        "when": format::event_when(event, tz),
                    })
                })
                .collect();
            Json(json!({
                "date": date,
                "friendly_date": format::friendly_date(date, today),
                "count": reminders.len(),
                "reminders": reminders,
            }))
            .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    text: String,
    #[serde(default = "default_sim_sender")]
    sender: String,
    #[serde(default)]
    name: Option<String>,
}

fn default_sim_sender() -> String {
    "simulator".to_string()
}

async fn simulate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SimulateRequest>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let recording = RecordingChannel::new();
    let service = state.service.with_channel(Arc::new(recording.clone()));
    let name = request.name.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME);
    service.on_inbound_text(&request.sender, &request.text, name).await;

    let replies = recording.texts_for(&request.sender).await;
    let draft = service.draft_for(&request.sender).await;
    let session = service.session_for(&request.sender).await;

    Json(json!({
        "sender": request.sender,
        "replies": replies,
        "draft": draft,
        "management_mode": session.as_ref().map(|s| s.mode()),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    text: String,
}

async fn parse_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ParseRequest>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    match state.service.parse(&request.text).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}
