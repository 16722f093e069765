//! Error types and handling
//!
//! This module provides the error types shared by the nudge engine and its
//! command handlers. All errors implement the `ErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry secret values (API keys, access tokens). Values
//! read from the keychain or environment are only ever referred to by key name.

use thiserror::Error;

/// Trait for nudge error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to show to an operator and never contains secrets.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors require operator intervention (fix config, add credentials).
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Secrets**: Missing credentials or keychain failures
/// - **LLM Provider**: API failures, authentication errors
/// - **Calendar**: Calendar collaborator failures
/// - **Network**: Transport failures talking to any collaborator
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::SecretMissing("gemini_api_key".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let transient = EngineError::Network("connection reset".to_string());
/// assert!(transient.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    // Secret errors
    #[error("Secret not found: {0}")]
    SecretMissing(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Calendar errors
    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Calendar not configured")]
    CalendarUnavailable,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::InvalidTimezone(_) => "Use an IANA timezone name such as 'Europe/Berlin'",

            Self::SecretMissing(_) => {
                "Set the secret with 'nudge secret set <key>' or the NUDGE_<KEY> environment variable"
            }
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",

            Self::Calendar(_) => "Calendar operation failed. Try again later",
            Self::CalendarUnavailable => "Add Google Calendar credentials to enable calendar features",

            Self::Network(_) => "Network operation failed. Check your connection",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::InvalidTimezone(_)
            | Self::SecretMissing(_)
            | Self::CalendarUnavailable => false,

            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_never_empty() {
        let errors = vec![
            EngineError::Config("bad".to_string()),
            EngineError::InvalidTimezone("Mars/Olympus".to_string()),
            EngineError::SecretMissing("gemini_api_key".to_string()),
            EngineError::KeyringError("locked".to_string()),
            EngineError::LLMProvider("down".to_string()),
            EngineError::Calendar("500".to_string()),
            EngineError::CalendarUnavailable,
            EngineError::Network("reset".to_string()),
        ];

        for error in errors {
            assert!(!error.user_hint().is_empty(), "missing hint for {:?}", error);
        }
    }

    #[test]
    fn test_recoverability() {
        assert!(!EngineError::CalendarUnavailable.is_recoverable());
        assert!(!EngineError::Config("x".to_string()).is_recoverable());
        assert!(EngineError::Calendar("timeout".to_string()).is_recoverable());
        assert!(EngineError::Network("reset".to_string()).is_recoverable());
    }

    #[test]
    fn test_display_does_not_leak_details_beyond_message() {
        let error = EngineError::SecretMissing("whatsapp_access_token".to_string());
        assert_eq!(error.to_string(), "Secret not found: whatsapp_access_token");
    }
}
