use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Feature, GenerateParams, GenerationResponse, Provider};
use super::configs::GroqProviderConfig;
use super::utils::{messages_to_wire, response_to_generation, tools_to_wire};
use crate::errors::AgentError;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Groq adapter, using their OpenAI-compatible chat completions API.
///
/// Primary backend: fast inference and native tool calling.
pub struct GroqProvider {
    client: Option<Client>,
    config: GroqProviderConfig,
}

impl GroqProvider {
    pub fn new(config: GroqProviderConfig) -> Self {
        Self {
            client: None,
            config,
        }
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AgentError::NotInitialized("groq".to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn initialize(&mut self) -> bool {
        match Client::builder().timeout(self.config.timeout).build() {
            Ok(client) => {
                self.client = Some(client);
                tracing::debug!(model = %self.config.model, "initialized groq client");
                true
            }
            Err(e) => {
                tracing::error!("failed to build groq http client: {e}");
                false
            }
        }
    }

    async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: Option<&[Tool]>,
        params: &GenerateParams,
    ) -> Result<GenerationResponse> {
        let model = params.model_id.as_deref().unwrap_or(&self.config.model);
        let wire_messages = messages_to_wire(messages, system_prompt);

        let mut payload = json!({
            "model": model,
            "messages": wire_messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        let body = payload.as_object_mut().ok_or(AgentError::Internal(
            "payload must be an object".to_string(),
        ))?;

        if params.json_mode {
            body.insert(
                "response_format".to_string(),
                json!({"type": "json_object"}),
            );
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body.insert("tools".to_string(), json!(tools_to_wire(tools)?));
            body.insert("tool_choice".to_string(), json!("auto"));
        }

        tracing::debug!(
            model,
            tools = tools.map_or(0, <[Tool]>::len),
            "groq request"
        );

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Groq API error: {}", error));
        }

        response_to_generation(&response)
    }

    fn supports_native(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Conversation | Feature::System | Feature::Tools | Feature::JsonMode
        )
    }

    async fn cleanup(&mut self) {
        self.client = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, GroqProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = GroqProviderConfig::new(
            "test_api_key".to_string(),
            "llama-3.3-70b-versatile".to_string(),
        )
        .with_base_url(mock_server.uri())
        .with_timeout(Duration::from_secs(5));

        let mut provider = GroqProvider::new(config);
        assert!(provider.initialize().await);
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_generate_text() -> Result<()> {
        let response_body = json!({
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "df -h"}
            }]
        });
        let (_server, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user("show disk usage")];
        let response = provider
            .generate(
                &messages,
                Some("You are a shell command translator."),
                None,
                &GenerateParams::default(),
            )
            .await?;

        assert_eq!(response, GenerationResponse::Text("df -h".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_tool_request() -> Result<()> {
        let response_body = json!({
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "list_directory",
                            "arguments": "{\"path\": \".\"}"
                        }
                    }]
                }
            }]
        });
        let (_server, provider) = setup_mock_server(response_body).await;

        let tools = vec![Tool::new("list_directory", "List a directory", json!({}))];
        let messages = vec![Message::user("what is in here")];
        let response = provider
            .generate(&messages, None, Some(&tools), &GenerateParams::default())
            .await?;

        match response {
            GenerationResponse::ToolRequest { tool_calls, .. } => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].name, "list_directory");
                assert_eq!(tool_calls[0].arguments, json!({"path": "."}));
            }
            other => panic!("expected ToolRequest, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_choice_sent_only_with_tools() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"tool_choice": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "ok"}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = GroqProviderConfig::new("k".to_string(), "m".to_string())
            .with_base_url(mock_server.uri());
        let mut provider = GroqProvider::new(config);
        provider.initialize().await;

        let tools = vec![Tool::new("read_file", "Read a file", json!({}))];
        provider
            .generate(
                &[Message::user("hi")],
                None,
                Some(&tools),
                &GenerateParams::default(),
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_fails_generate() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let config = GroqProviderConfig::new("k".to_string(), "m".to_string())
            .with_base_url(mock_server.uri());
        let mut provider = GroqProvider::new(config);
        provider.initialize().await;

        let result = provider
            .generate(&[Message::user("hi")], None, None, &GenerateParams::default())
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Server error"));
    }

    #[tokio::test]
    async fn test_generate_before_initialize_fails() {
        let config = GroqProviderConfig::new("k".to_string(), "m".to_string());
        let provider = GroqProvider::new(config);

        let result = provider
            .generate(&[Message::user("hi")], None, None, &GenerateParams::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let config = GroqProviderConfig::new("k".to_string(), "m".to_string());
        let mut provider = GroqProvider::new(config);
        provider.initialize().await;
        provider.cleanup().await;
        provider.cleanup().await;
    }

    #[test]
    fn test_supports_native() {
        let provider = GroqProvider::new(GroqProviderConfig::new("k".into(), "m".into()));
        assert!(provider.supports_native(Feature::Tools));
        assert!(provider.supports_native(Feature::JsonMode));
        assert!(provider.supports_native(Feature::Conversation));
        assert!(provider.supports_native(Feature::System));
    }
}
