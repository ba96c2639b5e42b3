use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

/// Features a backend may support natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Conversation,
    System,
    Tools,
    JsonMode,
}

/// Generation parameters shared across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Override the provider's configured model for this call
    pub model_id: Option<String>,
    pub max_tokens: i32,
    pub temperature: f32,
    pub json_mode: bool,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            model_id: None,
            max_tokens: 1024,
            temperature: 0.3,
            json_mode: false,
        }
    }
}

/// Outcome of one generate exchange with a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationResponse {
    /// Terminal: the model answered with plain text.
    Text(String),
    /// Non-terminal: the model wants tools executed before it answers.
    /// `text` may be empty; `tool_calls` preserves request order.
    ToolRequest {
        text: String,
        tool_calls: Vec<ToolCall>,
        stop_reason: String,
    },
}

/// Base trait for LLM backends (Groq, Cerebras, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Prepare the network client. Returns false if the provider cannot
    /// be used; callers should drop it rather than retry.
    async fn initialize(&mut self) -> bool;

    /// Perform one request/response exchange with the backend.
    ///
    /// `tools` being None means tool calling is withdrawn for this call.
    async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: Option<&[Tool]>,
        params: &GenerateParams,
    ) -> Result<GenerationResponse>;

    fn supports_native(&self, feature: Feature) -> bool;

    /// Release the network client. Idempotent.
    async fn cleanup(&mut self);
}
