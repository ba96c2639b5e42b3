use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Feature, GenerateParams, GenerationResponse, Provider};

/// One recorded generate call, for asserting on what the loop sent.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools_enabled: bool,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<GenerationResponse>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    fail: bool,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<GenerationResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A provider whose generate call always fails
    pub fn failing() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn initialize(&mut self) -> bool {
        true
    }

    async fn generate(
        &self,
        messages: &[Message],
        _system_prompt: Option<&str>,
        tools: Option<&[Tool]>,
        _params: &GenerateParams,
    ) -> Result<GenerationResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tools_enabled: tools.is_some_and(|t| !t.is_empty()),
        });

        if self.fail {
            return Err(anyhow!("mock provider failure"));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty text if no more pre-configured responses
            Ok(GenerationResponse::Text(String::new()))
        } else {
            Ok(responses.remove(0))
        }
    }

    fn supports_native(&self, _feature: Feature) -> bool {
        true
    }

    async fn cleanup(&mut self) {}
}
