//! Command handlers for CLI operations
//!
//! Each handler assembles the collaborators it needs from [`Config`] and the
//! secret store, then runs one command:
//! - serve: webhook server
//! - parse: extraction and completion check
//! - simulate: one message through the full conversation
//! - resolve: date phrase resolution
//! - doctor: configuration and collaborator checks
//! - secret: keychain management
//! - calendar-auth: Google consent flow for the refresh token

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use crate::calendar::{oauth, EventStore, GoogleCalendarStore, InMemoryEventStore, TimeRange};
use crate::channel::{MessageChannel, RecordingChannel, WhatsAppChannel};
use crate::cli::SecretAction;
use crate::config::Config;
use crate::llm::{GeminiProvider, LLMProvider};
use crate::reminder::{ReminderExtractor, ReminderService};
use crate::secrets::{self, SecretCache, SecretManager, SecretString};
use crate::server::{self, AppState};
use sdk::{EngineError, ErrorExt};

/// Keychain service name and environment prefix (`NUDGE_*`)
pub const SERVICE_NAME: &str = "nudge";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn secret_cache() -> Arc<SecretCache> {
    Arc::new(SecretCache::new(Arc::new(SecretManager::new(SERVICE_NAME))))
}

/// Gemini-backed extractor
pub fn build_extractor(config: &Config, secrets: Arc<SecretCache>) -> Result<Arc<ReminderExtractor>> {
    let provider: Arc<dyn LLMProvider> = Arc::new(GeminiProvider::new(
        config.llm.gemini.clone(),
        secrets,
        config.network.timeout(),
    ));
    let tz = config.timezone()?;
    Ok(Arc::new(ReminderExtractor::new(
        provider,
        tz,
        config.llm.gemini.edit_max_output_tokens,
    )))
}

/// Google Calendar store, or `None` when disabled or credentials are missing
pub fn build_calendar(config: &Config, secrets: &SecretCache) -> Result<Option<Arc<dyn EventStore>>> {
    if !config.calendar.enabled {
        tracing::info!("Calendar disabled in configuration");
        return Ok(None);
    }

    let client_id = secrets.lookup(secrets::GOOGLE_CLIENT_ID)?;
    let client_secret = secrets.lookup(secrets::GOOGLE_CLIENT_SECRET)?;
    let refresh_token = secrets.lookup(secrets::GOOGLE_REFRESH_TOKEN)?;

    match (client_id, client_secret, refresh_token) {
        (Some(id), Some(secret), Some(refresh)) => {
            tracing::info!(calendar_id = %config.calendar.calendar_id, "Google Calendar configured");
            Ok(Some(Arc::new(GoogleCalendarStore::new(
                config.calendar.clone(),
                id,
                secret,
                refresh,
                config.network.timeout(),
            ))))
        }
        _ => {
            tracing::warn!("Google Calendar credentials missing; calendar features disabled");
            Ok(None)
        }
    }
}

fn build_whatsapp(config: &Config, secrets: &SecretCache) -> Result<Arc<dyn MessageChannel>> {
    let token = secrets
        .require(secrets::WHATSAPP_ACCESS_TOKEN)
        .context("WhatsApp access token is required to serve")?;
    Ok(Arc::new(WhatsAppChannel::new(
        config.whatsapp.clone(),
        token,
        config.network.timeout(),
    )))
}

fn build_service(
    config: &Config,
    secrets: Arc<SecretCache>,
    calendar: Option<Arc<dyn EventStore>>,
    channel: Arc<dyn MessageChannel>,
) -> Result<ReminderService> {
    let extractor = build_extractor(config, secrets)?;
    Ok(ReminderService::new(
        extractor,
        calendar,
        channel,
        &config.conversation,
        config.timezone()?,
    ))
}

/// Run the webhook server until shutdown
pub async fn handle_serve(config: &Config) -> Result<()> {
    let secrets = secret_cache();
    let calendar = build_calendar(config, &secrets)?;
    let channel = build_whatsapp(config, &secrets)?;
    let service = build_service(config, secrets.clone(), calendar, channel)?;

    let verify_token = secrets.lookup(secrets::WHATSAPP_VERIFY_TOKEN)?;
    if verify_token.is_none() {
        tracing::warn!("No webhook verify token configured; verification requests will be rejected");
    }

    let admin_token = if config.server.admin_enabled {
        let token = secrets.lookup(secrets::ADMIN_TOKEN)?;
        if token.is_none() {
            tracing::warn!("Admin routes enabled without an admin token");
        }
        token
    } else {
        None
    };
    server::check_admin_exposure(&config.server.bind, config.server.admin_enabled, admin_token.is_some())?;

    let state = AppState::new(service)
        .with_verify_token(verify_token)
        .with_admin(config.server.admin_enabled, admin_token);

    tracing::info!(
        timezone = %config.core.timezone,
        model = %config.llm.gemini.model,
        admin = config.server.admin_enabled,
        "Starting nudge"
    );
    server::serve(&config.server.bind, state).await?;
    Ok(())
}

/// Extract once and print draft, missing fields and projected event
pub async fn handle_parse(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let secrets = secret_cache();
    let service = build_service(config, secrets, None, Arc::new(RecordingChannel::new()))?;

    let report = service
        .parse(&text)
        .await
        .map_err(EngineError::from)
        .context("Could not extract a reminder")?;

    match format {
        OutputFormat::Text => {
            println!("Draft:");
            println!("{}", serde_json::to_string_pretty(&report.draft)?);
            println!();
            if report.missing.is_empty() {
                println!("Complete");
            } else {
                let missing: Vec<String> = report.missing.iter().map(|m| m.to_string()).collect();
                println!("Missing: {}", missing.join(", "));
            }
            if let Some(question) = &report.question {
                println!();
                println!("{}", question);
            }
            if let Some(event) = &report.event {
                println!();
                println!("Calendar event:");
                println!("{}", serde_json::to_string_pretty(event)?);
            }
            if let Some(error) = &report.projection_error {
                println!();
                println!("Cannot project: {}", error);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Run one inbound message and print the replies it produced
pub async fn handle_simulate(
    text: String,
    sender: String,
    name: String,
    offline: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let secrets = secret_cache();
    let calendar: Option<Arc<dyn EventStore>> = if offline {
        Some(Arc::new(InMemoryEventStore::new(config.timezone()?)))
    } else {
        build_calendar(config, &secrets)?
    };

    let recording = RecordingChannel::new();
    let service = build_service(config, secrets, calendar, Arc::new(recording.clone()))?;
    service.on_inbound_text(&sender, &text, &name).await;

    let replies = recording.texts_for(&sender).await;
    let session = service.session_for(&sender).await;

    match format {
        OutputFormat::Text => {
            for reply in &replies {
                println!("{}", reply);
                println!();
            }
            if let Some(draft) = service.draft_for(&sender).await {
                println!("(draft pending: {})", serde_json::to_string(&draft)?);
            }
            if let Some(session) = session {
                println!("(management mode: {})", session.mode());
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "sender": sender,
                "replies": replies,
                "draft": service.draft_for(&sender).await,
                "management_mode": session.as_ref().map(|s| s.mode()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Resolve a date phrase in the configured timezone
pub fn handle_resolve(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let resolver = crate::reminder::DateResolver::new(config.timezone()?);
    let now = chrono::Utc::now();
    let resolved = resolver.resolve(&text, now);

    match format {
        OutputFormat::Text => match resolved {
            Some(crate::reminder::Resolved::Day { date }) => {
                println!("{}", date.format("%A, %B %d, %Y"));
            }
            Some(crate::reminder::Resolved::Range { range }) => {
                println!(
                    "{} to {}",
                    range.start.format("%A, %B %d, %Y"),
                    range.end.format("%A, %B %d, %Y")
                );
            }
            None => println!("No date found in '{}'", text),
        },
        OutputFormat::Json => {
            let output = json!({
                "text": text,
                "today": resolver.today(now),
                "resolved": resolved,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Validate configuration, secrets and collaborator reachability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration".to_string(), "Valid".to_string()));
    checks.push(("Timezone".to_string(), config.core.timezone.clone()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory".to_string(), "Exists".to_string()));
    } else {
        checks.push(("Data directory".to_string(), "Missing".to_string()));
        issues.push(format!("Data directory does not exist: {:?}", config.core.data_dir));
    }

    let secrets = secret_cache();
    for (key, present) in secrets.presence(secrets::KNOWN_KEYS) {
        let status = if present { "Configured" } else { "Not configured" };
        checks.push((key, status.to_string()));
    }

    let extractor = build_extractor(config, secrets.clone())?;
    let provider = extractor.provider();
    if provider.check_health().await {
        checks.push((format!("Extractor ({})", provider.model()), "Ready".to_string()));
    } else {
        checks.push((format!("Extractor ({})", provider.model()), "Unavailable".to_string()));
        issues.push("Gemini API key missing. Run 'nudge secret set gemini_api_key'.".to_string());
    }

    if config.whatsapp.phone_number_id.trim().is_empty() {
        checks.push(("WhatsApp".to_string(), "Not configured".to_string()));
        issues.push("whatsapp.phone_number_id is empty".to_string());
    } else if !secrets.manager().has_secret(secrets::WHATSAPP_ACCESS_TOKEN) {
        checks.push(("WhatsApp".to_string(), "Token missing".to_string()));
        issues.push("WhatsApp access token missing".to_string());
    } else {
        checks.push(("WhatsApp".to_string(), "Configured".to_string()));
    }

    match build_calendar(config, &secrets)? {
        None => {
            checks.push(("Calendar".to_string(), "Not configured".to_string()));
            issues.push("Calendar unavailable: listing and management are disabled".to_string());
            if config.calendar.enabled && !secrets.manager().has_secret(secrets::GOOGLE_REFRESH_TOKEN) {
                issues.push(
                    "No Google refresh token. Set google_client_id and google_client_secret, \
                     then run 'nudge calendar-auth'."
                        .to_string(),
                );
            }
        }
        Some(store) => {
            let tz = config.timezone()?;
            let today = chrono::Utc::now().with_timezone(&tz).date_naive();
            match store.list(&TimeRange::day(today, tz)).await {
                Ok(events) => checks.push((
                    "Calendar".to_string(),
                    format!("Reachable ({} events today)", events.len()),
                )),
                Err(e) => {
                    let error = EngineError::from(e);
                    checks.push(("Calendar".to_string(), "Unreachable".to_string()));
                    issues.push(format!("Calendar check failed: {} ({})", error, error.user_hint()));
                }
            }
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Nudge Diagnostics");
            println!("=================");
            println!();

            println!("Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// How long `calendar-auth` waits for the browser redirect
const CONSENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Run the browser consent flow, store the refresh token and confirm the account
pub async fn handle_calendar_auth(port: u16, config: &Config) -> Result<()> {
    let secrets = secret_cache();
    let client_id = secrets
        .require(secrets::GOOGLE_CLIENT_ID)
        .context("Run 'nudge secret set google_client_id' first")?;
    let client_secret = secrets
        .require(secrets::GOOGLE_CLIENT_SECRET)
        .context("Run 'nudge secret set google_client_secret' first")?;

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("Failed to open the local redirect listener")?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    let url = oauth::consent_url(oauth::AUTH_URL, client_id.expose(), &redirect_uri)?;

    println!("Open this URL in a browser and approve calendar access:");
    println!();
    println!("  {}", url);
    println!();
    println!("Waiting for the redirect to {} ...", redirect_uri);

    let code = tokio::time::timeout(CONSENT_TIMEOUT, oauth::receive_code(listener))
        .await
        .context("Timed out waiting for approval")??;

    let client = reqwest::Client::builder()
        .timeout(config.network.timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let refresh_token = oauth::exchange_code(
        &client,
        &config.calendar.token_url,
        &client_id,
        &client_secret,
        &code,
        &redirect_uri,
    )
    .await?;

    SecretManager::new(SERVICE_NAME).set_secret(secrets::GOOGLE_REFRESH_TOKEN, refresh_token.expose())?;
    println!("✓ Stored '{}' in the OS keychain", secrets::GOOGLE_REFRESH_TOKEN);

    let store = GoogleCalendarStore::new(
        config.calendar.clone(),
        client_id,
        client_secret,
        refresh_token,
        config.network.timeout(),
    );
    match store.calendar_summary().await {
        Ok(summary) => println!("✓ Connected to calendar: {}", summary),
        Err(e) => println!("⚠ Token stored, but reading the calendar failed: {}", e),
    }

    Ok(())
}

/// Set, delete or list keychain secrets
pub fn handle_secret(action: SecretAction, format: OutputFormat) -> Result<()> {
    let manager = SecretManager::new(SERVICE_NAME);

    let check_key = |key: &str| -> Result<()> {
        if secrets::KNOWN_KEYS.contains(&key) {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Unknown secret '{}'. Known secrets: {}",
                key,
                secrets::KNOWN_KEYS.join(", ")
            ))
        }
    };

    match action {
        SecretAction::Set { key } => {
            check_key(&key)?;
            let value = SecretString::new(manager.prompt_for_secret(&key)?);
            manager.set_secret(&key, value.expose())?;
            println!("✓ Stored '{}' in the OS keychain", key);
        }
        SecretAction::Delete { key } => {
            check_key(&key)?;
            manager.delete_secret(&key)?;
            println!("✓ Removed '{}' from the OS keychain", key);
        }
        SecretAction::List => {
            let cache = SecretCache::new(Arc::new(manager));
            let presence = cache.presence(secrets::KNOWN_KEYS);
            match format {
                OutputFormat::Text => {
                    for (key, present) in &presence {
                        let mark = if *present { "✓" } else { "✗" };
                        println!(
                            "  {} {:<25} (env: {})",
                            mark,
                            key,
                            cache.manager().env_var_name(key)
                        );
                    }
                }
                OutputFormat::Json => {
                    let output: Vec<_> = presence
                        .iter()
                        .map(|(key, present)| json!({ "key": key, "present": present }))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
        }
    }

    Ok(())
}
