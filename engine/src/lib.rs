//! Nudge Engine Library
//!
//! Conversational reminders over WhatsApp: extraction, completion,
//! calendar projection and reminder management. Used by the `nudge` binary
//! and the integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Extractor capability (LLM providers)
pub mod llm;

/// Calendar event store
pub mod calendar;

/// Inbound webhook payloads and outbound message delivery
pub mod channel;

/// Conversation engine
pub mod reminder;

/// HTTP surface
pub mod server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
