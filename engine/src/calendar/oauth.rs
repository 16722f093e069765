//! Installed-app OAuth flow for obtaining a Google refresh token
//!
//! The user approves calendar access in a browser. Google redirects to a
//! one-shot loopback listener with an authorization code, which is traded
//! for the long-lived refresh token [`GoogleAuth`](super::GoogleAuth) needs.

use super::{CalendarError, Result};
use crate::secrets::{scrub, SecretString};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

/// Google's consent screen
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Read/write access to the user's calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Consent URL for `client_id`.
///
/// `access_type=offline` with `prompt=consent` makes Google return a refresh
/// token even when the account approved this client before.
pub fn consent_url(auth_url: &str, client_id: &str, redirect_uri: &str) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        auth_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| CalendarError::Parse(format!("invalid authorization URL: {}", e)))?;
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    refresh_token: Option<String>,
}

/// Trade an authorization code for a refresh token
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &SecretString,
    client_secret: &SecretString,
    code: &str,
    redirect_uri: &str,
) -> Result<SecretString> {
    let params = [
        ("client_id", client_id.expose()),
        ("client_secret", client_secret.expose()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    let response = client
        .post(token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| CalendarError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(CalendarError::AuthenticationFailed(format!(
            "code exchange failed ({}): {}",
            status,
            scrub(&body)
        )));
    }

    let body: ExchangeResponse = response
        .json()
        .await
        .map_err(|e| CalendarError::Parse(e.to_string()))?;

    body.refresh_token.map(SecretString::new).ok_or_else(|| {
        CalendarError::AuthenticationFailed(
            "Google returned no refresh token; remove this app's access in your Google account and retry"
                .to_string(),
        )
    })
}

#[derive(Debug, Deserialize)]
struct Callback {
    code: Option<String>,
    error: Option<String>,
}

type CodeSender = Arc<Mutex<Option<oneshot::Sender<std::result::Result<String, String>>>>>;

async fn callback(State(sender): State<CodeSender>, Query(query): Query<Callback>) -> &'static str {
    let outcome = match (query.code, query.error) {
        (Some(code), _) => Ok(code),
        (None, Some(error)) => Err(error),
        (None, None) => Err("redirect carried no authorization code".to_string()),
    };
    let approved = outcome.is_ok();

    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(outcome);
    }

    if approved {
        "Nudge is authorized. You can close this tab."
    } else {
        "Authorization failed. Check the terminal for details."
    }
}

/// Serve Google's redirect on `listener` once and return the authorization code
pub async fn receive_code(listener: TcpListener) -> Result<String> {
    let (code_tx, code_rx) = oneshot::channel();
    let state: CodeSender = Arc::new(Mutex::new(Some(code_tx)));
    let app = Router::new().route("/", get(callback)).with_state(state);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = code_rx.await;
    let _ = stop_tx.send(());
    if let Ok(Err(e)) = server.await {
        tracing::debug!(error = %e, "Redirect listener stopped with an error");
    }

    match outcome {
        Ok(Ok(code)) => Ok(code),
        Ok(Err(reason)) => Err(CalendarError::AuthenticationFailed(format!(
            "consent not granted: {}",
            reason
        ))),
        Err(_) => Err(CalendarError::AuthenticationFailed(
            "redirect listener closed before a code arrived".to_string(),
        )),
    }
}
