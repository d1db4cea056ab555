//! Text generation over HTTP (OpenAI-compatible or Anthropic-compatible APIs).

use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::AiConfig;
use crate::error::DocError;

/// Something that turns a prompt into prose.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DocError>;
}

/// Calls a hosted LLM API.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: AiConfig,
}

impl HttpTextGenerator {
    pub fn new(config: AiConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// POST {base_url}/v1/messages
    /// Headers:
    ///   x-api-key: {api_key}
    ///   anthropic-version: 2023-06-01
    async fn call_anthropic(&self, system: &str, prompt: &str) -> Result<String, DocError> {
        let config = &self.config;
        let url = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "messages": [{ "role": "user", "content": prompt }]
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[Enhancer] Calling Anthropic API: {} (model: {})", url, config.model);

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body);
        let json = send(request).await?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                    .map(str::to_string)
                    .reduce(|a, b| format!("{}\n{}", a, b))
            })
            .ok_or_else(|| DocError::Enhancement("Unexpected response format from Anthropic API".to_string()))?;

        Ok(content.trim().to_string())
    }

    /// POST {base_url}/chat/completions
    /// Headers:
    ///   Authorization: Bearer {api_key}
    async fn call_openai(&self, system: &str, prompt: &str) -> Result<String, DocError> {
        let config = &self.config;
        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        let mut messages = vec![];
        if !system.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let mut body = serde_json::json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": config.max_tokens
        });
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[Enhancer] Calling OpenAI API: {} (model: {})", url, config.model);

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("content-type", "application/json")
            .json(&body);
        let json = send(request).await?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| DocError::Enhancement("Unexpected response format from OpenAI API".to_string()))
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<serde_json::Value, DocError> {
    let response = request
        .send()
        .await
        .map_err(|e| DocError::Enhancement(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| DocError::Enhancement(format!("Failed to read response body: {}", e)))?;

    if !status.is_success() {
        return Err(DocError::Enhancement(format!("API returned {}: {}", status, text)));
    }

    serde_json::from_str(&text)
        .map_err(|e| DocError::Enhancement(format!("Failed to parse response JSON: {}", e)))
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DocError> {
        match self.config.adapter.as_str() {
            "anthropic" | "claude" => self.call_anthropic(system, prompt).await,
            "openai" | "opencode" => self.call_openai(system, prompt).await,
            other => Err(DocError::Config(format!("Unknown adapter type: '{}'", other))),
        }
    }
}

/// Replies with fixed text (or fails) and records every prompt it was given.
pub struct MockTextGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, DocError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply
            .clone()
            .ok_or_else(|| DocError::Enhancement("mock generator configured to fail".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_adapter_is_a_config_error() {
        let generator = HttpTextGenerator::new(AiConfig {
            adapter: "mystery".to_string(),
            ..Default::default()
        });
        let err = generator.generate("", "hi").await.unwrap_err();
        assert!(matches!(err, DocError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_enhancement_error() {
        let generator = HttpTextGenerator::new(AiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test".to_string(),
            ..Default::default()
        });
        let err = generator.generate("system", "hi").await.unwrap_err();
        assert!(matches!(err, DocError::Enhancement(_)));
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockTextGenerator::replying("ok");
        assert_eq!(mock.generate("s", "first").await.unwrap(), "ok");
        assert!(MockTextGenerator::failing().generate("s", "x").await.is_err());
        assert_eq!(mock.prompts(), vec!["first".to_string()]);
    }
}
