//! OpenAI-compatible chat client backing the live collaborator.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::generate::{Generate, GenerateError};

const DEFAULT_API_URL: &str = "https://api.deepseek.com/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-chat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Text-generation client for any OpenAI-compatible completions endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerateError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }

    /// Reads `ARENA_API_URL`, `ARENA_API_KEY`, and `ARENA_MODEL`. Only the
    /// key is required.
    pub fn from_env() -> Result<Self, GenerateError> {
        let api_key = std::env::var("ARENA_API_KEY")
            .map_err(|_| GenerateError::Request("ARENA_API_KEY is not set".to_string()))?;
        let api_url =
            std::env::var("ARENA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = std::env::var("ARENA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_url, api_key, model)
    }
}

#[async_trait]
impl Generate for ChatClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerateError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": 1.2,
            "max_tokens": 400
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerateError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Request(format!(
                "chat API error ({status}): {body}"
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerateError::Malformed(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GenerateError::Malformed("completion carried no content".to_string())
            })?;

        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
