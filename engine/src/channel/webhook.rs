//! WhatsApp Cloud API webhook payloads
//!
//! Only the parts the engine reads are modelled; unknown fields are ignored.

use serde::Deserialize;

/// Display name used when the payload carries no matching contact
pub const DEFAULT_DISPLAY_NAME: &str = "there";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

/// A text message ready for the conversation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub sender: String,
    pub text: String,
    pub display_name: String,
}

impl WebhookPayload {
    /// Text messages from `messages` changes, with sender display names resolved
    pub fn inbound_texts(&self) -> Vec<InboundText> {
        let mut texts = Vec::new();
        for change in self.entry.iter().flat_map(|e| e.changes.iter()) {
            if change.field != "messages" {
                continue;
            }
            let value = &change.value;
            if value.messages.is_empty() && !value.statuses.is_empty() {
                tracing::debug!(count = value.statuses.len(), "Ignoring status updates");
                continue;
            }
            for message in &value.messages {
                if message.kind != "text" {
                    tracing::debug!(kind = %message.kind, "Ignoring non-text message");
                    continue;
                }
                let Some(text) = message.text.as_ref() else {
                    continue;
                };
                texts.push(InboundText {
                    sender: message.from.clone(),
                    text: text.body.clone(),
                    display_name: display_name_for(&value.contacts, &message.from),
                });
            }
        }
        texts
    }
}

fn display_name_for(contacts: &[Contact], sender: &str) -> String {
    contacts
        .iter()
        .find(|c| c.wa_id == sender)
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
}
