use super::{GenerationOptions, LLMError, LLMProvider, Message, MessageRole};
use crate::config::GeminiConfig;
use crate::secrets::{SecretCache, GEMINI_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Google Gemini `generateContent` client
pub struct GeminiProvider {
    config: GeminiConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, secret_cache: Arc<SecretCache>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            secret_cache,
            client,
        }
    }

    fn build_payload(&self, messages: &[Message], options: GenerationOptions) -> serde_json::Value {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for msg in messages {
            if msg.role == MessageRole::System {
                system_parts.push(json!({"text": msg.content}));
                continue;
            }

            contents.push(json!({
                "role": if msg.role == MessageRole::Assistant { "model" } else { "user" },
                "parts": [{"text": msg.content}]
            }));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));
        payload.insert(
            "generationConfig".to_string(),
            json!({
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "maxOutputTokens": options
                    .max_output_tokens
                    .unwrap_or(self.config.max_output_tokens),
            }),
        );

        if !system_parts.is_empty() {
            payload.insert(
                "systemInstruction".to_string(),
                json!({ "parts": system_parts }),
            );
        }

        serde_json::Value::Object(payload)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn check_health(&self) -> bool {
        matches!(self.secret_cache.lookup(GEMINI_API_KEY), Ok(Some(_)))
    }

    async fn generate(
        &self,
        messages: &[Message],
        options: GenerationOptions,
    ) -> super::Result<String> {
        let api_key = self
            .secret_cache
            .require(GEMINI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let payload = self.build_payload(messages, options);

        tracing::debug!(model = %self.config.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.expose())])
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    // reqwest errors carry the URL, which carries the key
                    LLMError::NetworkError(crate::secrets::scrub(&e.without_url().to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 | 404 => LLMError::InvalidRequest(text),
                429 => LLMError::RateLimitExceeded,
                401 | 403 => LLMError::AuthenticationFailed(text),
                _ => LLMError::ProviderUnavailable(format!(
                    "Gemini API error ({}): {}",
                    status, text
                )),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let parts = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or(LLMError::EmptyResponse)?;

        let full_text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();

        if full_text.trim().is_empty() {
            return Err(LLMError::EmptyResponse);
        }

        Ok(full_text)
    }
}
