use super::{truncate_message, ChannelError, MessageChannel, MAX_MESSAGE_CHARS};
use crate::config::WhatsAppConfig;
use crate::secrets::{scrub, SecretString};
use crate::telemetry::mask_sender;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// WhatsApp Cloud API sender
#[derive(Clone)]
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    access_token: SecretString,
    client: Client,
}

impl std::fmt::Debug for WhatsAppChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppChannel")
            .field("phone_number_id", &self.config.phone_number_id)
            .finish()
    }
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig, access_token: SecretString, timeout: Duration) -> Self {
        Self {
            config,
            access_token,
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }
}

#[async_trait]
impl MessageChannel for WhatsAppChannel {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        if self.config.phone_number_id.is_empty() {
            return Err(ChannelError::NotConfigured(
                "whatsapp.phone_number_id is empty".to_string(),
            ));
        }

        // Scrub secrets from outgoing messages
        let scrubbed = scrub(text);
        let body = truncate_message(&scrubbed, MAX_MESSAGE_CHARS);

        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to: recipient,
            kind: "text",
            text: TextBody { body: &body },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.access_token.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(recipient = %mask_sender(recipient), "Message delivered");
        Ok(())
    }
}
