//! One-shot text generation through Gemini `generateContent`.

use async_trait::async_trait;
use std::time::Duration;

use super::provider::TextGenerator;
use crate::error::ConsultError;

/// Credential header. The key must never be part of the request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client for single-prompt generation.
pub struct GeminiTextClient {
    /// Gemini API key.
    api_key: String,
    /// Model to use (e.g. "gemini-2.0-flash-exp").
    model: String,
    /// `{api_base}/models/{model}:generateContent`.
    endpoint: String,
    /// HTTP client.
    client: reqwest::Client,
    timeout: Duration,
}

impl GeminiTextClient {
    pub fn new(api_key: String, api_base: &str, model: String, timeout: Duration) -> Self {
        Self {
            endpoint: format!(
                "{}/models/{}:generateContent",
                api_base.trim_end_matches('/'),
                model
            ),
            api_key,
            model,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, ConsultError> {
        Ok(Self::new(
            config.api_key()?.to_string(),
            &config.vendor.api_base,
            config.vendor.text_model.clone(),
            config.generation_timeout(),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for GeminiTextClient {
    /// Returns the first candidate's text, or an empty string when the
    /// response carries none.
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
        let payload = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting Gemini generation");

        let resp = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {}: {}", status, body);
        }

        let body: serde_json::Value = resp.json().await.map_err(reqwest::Error::without_url)?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();
        Ok(text.to_string())
    }
}
