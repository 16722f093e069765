//! LLM Provider Abstraction Layer
//!
//! The reminder extractor talks to a language model through the
//! [`LLMProvider`] trait. Providers return raw text; the text is untrusted and
//! callers recover the JSON object they asked for with [`extract_json_object`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gemini;

pub use gemini::GeminiProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Provider returned no text")]
    EmptyResponse,
}

impl From<LLMError> for sdk::EngineError {
    fn from(e: LLMError) -> Self {
        match e {
            LLMError::NetworkError(message) => Self::Network(message),
            other => Self::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Per-call knobs layered over the provider's configured defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    /// Cap on generated tokens; `None` keeps the provider default
    pub max_output_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn with_max_output_tokens(tokens: u32) -> Self {
        Self {
            max_output_tokens: Some(tokens),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini")
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Single round-trip generation, no streaming
    ///
    /// # Returns
    /// * `Ok(String)` - The concatenated text of the first candidate
    /// * `Err(LLMError)` - If the request fails or no text came back
    async fn generate(&self, messages: &[Message], options: GenerationOptions)
        -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Recover the JSON object embedded in model output.
///
/// Handles, in order:
/// 1. The whole text is a JSON object
/// 2. A markdown code fence, with or without a language tag or trailing prose
/// 3. The first balanced `{...}` anywhere in the text
pub fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        let inner = inner.trim();
        if inner.starts_with('{') {
            return extract_balanced_json(inner).or(Some(inner));
        }
    }

    let pos = trimmed.find('{')?;
    extract_balanced_json(&trimmed[pos..])
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```, and when the
/// closing fence is missing altogether.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag ("json") if present
    let body_start_rel = match after_opening.find('\n') {
        Some(newline) => newline + 1,
        None => after_opening.find('{')?,
    };
    let body_start = fence_start + 3 + body_start_rel;

    let body_end = match content[body_start..].find("```") {
        Some(closing) => body_start + closing,
        None => content.len(),
    };

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let system_msg = Message::system("Extract reminders");
        assert_eq!(system_msg.role, MessageRole::System);
        assert_eq!(system_msg.role.to_string(), "system");
    }

    #[test]
    fn test_extract_plain_object() {
        let raw = r#"  {"task": "call mom"}  "#;
        assert_eq!(extract_json_object(raw), Some(r#"{"task": "call mom"}"#));
    }

    #[test]
    fn test_extract_fenced_with_language_tag() {
        let raw = "```json\n{\"task\": \"call mom\", \"time\": \"15:00\"}\n```";
        assert_eq!(
            extract_json_object(raw),
            Some("{\"task\": \"call mom\", \"time\": \"15:00\"}")
        );
    }

    #[test]
    fn test_extract_fenced_without_closing_fence() {
        let raw = "```json\n{\"task\": \"gym\"}";
        assert_eq!(extract_json_object(raw), Some("{\"task\": \"gym\"}"));
    }

    #[test]
    fn test_extract_from_prose() {
        let raw = "Sure! Here it is: {\"notes\": \"bring {cake}\"} hope that helps";
        assert_eq!(extract_json_object(raw), Some("{\"notes\": \"bring {cake}\"}"));
    }

    #[test]
    fn test_extract_none_without_object() {
        assert_eq!(extract_json_object("I could not find a reminder."), None);
        assert_eq!(extract_json_object(""), None);
    }

    #[test]
    fn test_generation_options() {
        assert_eq!(GenerationOptions::default().max_output_tokens, None);
        assert_eq!(
            GenerationOptions::with_max_output_tokens(300).max_output_tokens,
            Some(300)
        );
    }
}
