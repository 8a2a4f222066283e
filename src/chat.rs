//! Generative model client.
//!
//! [`ChatModel`] is the seam the answer synthesizer depends on;
//! [`OpenAiChat`] implements it against the chat-completions API. No retry
//! loop here: a failed completion is converted into a user-safe answer by
//! the query pipeline, and retries belong to the caller if anywhere.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::ChatConfig;
use crate::embedding::resolve_api_key;

/// Answers a (system, user) message pair with free text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

struct ProviderHandle {
    http: reqwest::Client,
    api_key: String,
}

/// Chat client backed by the OpenAI chat-completions API.
pub struct OpenAiChat {
    config: ChatConfig,
    handle: OnceCell<ProviderHandle>,
}

impl OpenAiChat {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    async fn handle(&self) -> Result<&ProviderHandle> {
        self.handle
            .get_or_try_init(|| async {
                let api_key = resolve_api_key().map_err(|e| anyhow::anyhow!(e))?;
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()?;
                Ok(ProviderHandle { http, api_key })
            })
            .await
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let handle = self.handle().await?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = handle
            .http
            .post(self.endpoint())
            .bearer_auth(&handle.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("chat provider returned {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion(&json)
    }
}

/// Extract the first choice's message content from a completion response.
pub fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing choices[0].message.content in chat response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_content() {
        let json = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Grounded answer."}}
            ]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Grounded answer.");
    }

    #[test]
    fn missing_content_is_an_error() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_completion(&json).is_err());
    }
}
