//! Conversational reminders
//!
//! Free-text messages become [`ReminderDraft`]s that are completed over one
//! or more turns and projected onto calendar events. Listing, editing and
//! deleting existing reminders runs through the management state machine.

pub mod completion;
pub mod dates;
pub mod draft;
pub mod extractor;
pub mod format;
pub mod management;
pub mod projector;
pub mod service;
pub mod session;

pub use completion::{clarification_question, missing_fields, MissingField};
pub use dates::{DateRange, DateResolver, RangeKind, Resolved};
pub use draft::{DraftUpdate, Recurrence, ReminderDraft, ReminderTime};
pub use extractor::{ExtractionError, ReminderExtractor};
pub use management::{Intent, ListScope, ManagementMachine, ManagementSession, Outcome};
pub use projector::{EventProjector, ProjectionError};
pub use service::{Clock, FixedClock, ParseReport, ReminderService, SystemClock};
pub use session::{InMemorySessionStore, SenderLocks, SessionStore};
