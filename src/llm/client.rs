use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// System and user message pair sent to the model
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Structured output contract: a named tool whose input the model must fill
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Opaque generative call
///
/// With a schema the model is asked for structured output; the returned value
/// may still be a JSON-encoded string, a bare list or a wrapping object, and
/// callers normalize it. Without a schema the reply is a `Value::String`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &Prompt, schema: Option<&OutputSchema>) -> Result<Value>;
}

/// Free-text call: the reply as a plain string
pub async fn invoke_text(llm: &dyn LanguageModel, prompt: &Prompt) -> Result<String> {
    match llm.invoke(prompt, None).await? {
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (EDITORIAL_MODEL env var overrides the default)
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let model = std::env::var("EDITORIAL_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, model))
    }

    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.2,
            max_tokens: 16_000,
        }
    }
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(&self, request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Anthropic API response")
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn invoke(&self, prompt: &Prompt, schema: Option<&OutputSchema>) -> Result<Value> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(prompt.system.clone()),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            tools: schema.map(|s| {
                vec![Tool {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    input_schema: s.input_schema.clone(),
                }]
            }),
            tool_choice: schema.map(|s| ToolChoice {
                choice_type: "tool".to_string(),
                name: s.name.clone(),
            }),
        };

        let response = self.post(&request).await?;

        if let Some(schema) = schema {
            for content in &response.content {
                if content.content_type == "tool_use"
                    && content.name.as_deref() == Some(schema.name.as_str())
                {
                    if let Some(input) = &content.input {
                        return Ok(input.clone());
                    }
                }
            }
        }

        // Without a tool call the text block is all we have; structured callers
        // try to decode it as JSON.
        response
            .content
            .iter()
            .find(|c| c.content_type == "text" && !c.text.is_empty())
            .map(|c| Value::String(c.text.clone()))
            .context("No usable content in response")
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_tools_for_free_text() {
        let request = AnthropicRequest {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 10,
            temperature: None,
            system: Some("sys".to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            tools: None,
            tool_choice: None,
        };

        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["system"], "sys");
    }

    #[test]
    fn test_parse_tool_use_response() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "name": "submit_edits", "input": {"blocks": []}}
            ]
        }"#;

        let response: AnthropicResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.content[0].content_type, "tool_use");
        assert_eq!(response.content[0].name.as_deref(), Some("submit_edits"));
        assert!(response.content[0].text.is_empty());
    }
}
