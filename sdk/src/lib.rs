//! Nudge SDK
//!
//! Shared error taxonomy and calendar wire types used by the engine and its
//! collaborator adapters.

/// Error types and handling
pub mod errors;

/// Calendar event types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{CalendarEvent, CreatedEvent, EventPatch, EventTime, NewEvent};
