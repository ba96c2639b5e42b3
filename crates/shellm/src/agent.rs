//! The orchestration loop: drives a bounded, multi-round conversation
//! between the active provider and the filesystem toolbox, then returns
//! a single command string.

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::models::message::Message;
use crate::output::clean_command;
use crate::prompt::build_system_prompt;
use crate::providers::base::{Feature, GenerateParams, GenerationResponse, Provider};
use crate::tools::Toolbox;
use crate::trace::Trace;

const FORCED_FINAL_PROMPT: &str = "You have used all available tool calls. \
    Based on the information gathered, provide your final answer now. \
    Do NOT call any tools. Return ONLY the shell command.";

/// One translation request, as supplied by the entry point.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub cwd: String,
    pub shell: String,
    pub os: String,
    pub history: String,
}

/// Agent couples an LLM provider with the toolbox it may pilot.
pub struct Agent {
    provider: Box<dyn Provider + Send + Sync>,
    toolbox: Option<Toolbox>,
    max_rounds: usize,
    trace: Trace,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Box<dyn Provider + Send + Sync>) -> Self {
        Self {
            provider,
            toolbox: None,
            max_rounds: 5,
            trace: Trace::disabled(),
        }
    }

    /// Give the agent filesystem inspection tools
    pub fn with_toolbox(mut self, toolbox: Toolbox) -> Self {
        self.toolbox = Some(toolbox);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Drive the conversation until the model produces a plain text
    /// answer, executing requested tools between rounds.
    ///
    /// Performs at most `max_rounds + 1` provider calls: one per round,
    /// plus the forced tool-free call when the budget runs out. A
    /// provider failure aborts immediately; tool failures only show up
    /// as error strings in that tool's result.
    pub async fn reply(
        &self,
        initial: Vec<Message>,
        system_prompt: &str,
        params: &GenerateParams,
    ) -> Result<String> {
        let mut conversation = initial;

        let tools = self
            .toolbox
            .as_ref()
            .filter(|_| self.provider.supports_native(Feature::Tools))
            .map(|_| Toolbox::schemas());

        self.trace.log(
            "CONVERSATION START",
            &json!({
                "system_prompt": system_prompt,
                "messages": conversation,
                "tools": tools.as_ref().map(|t| t.iter().map(|t| t.name.clone()).collect::<Vec<_>>()),
                "max_rounds": self.max_rounds,
            }),
        );

        for round in 1..=self.max_rounds {
            self.trace.log(
                &format!("REQUEST round={}/{}", round, self.max_rounds),
                &json!({
                    "messages": conversation,
                    "tools_enabled": tools.is_some(),
                }),
            );

            let response = match self
                .provider
                .generate(&conversation, Some(system_prompt), tools.as_deref(), params)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.trace
                        .log(&format!("ERROR round={}", round), &e.to_string());
                    tracing::error!("provider error (round {round}): {e:#}");
                    return Err(e);
                }
            };

            self.trace
                .log(&format!("RESPONSE round={}", round), &response);

            match response {
                GenerationResponse::Text(text) => return Ok(text),
                GenerationResponse::ToolRequest {
                    text, tool_calls, ..
                } => {
                    tracing::debug!(round, count = tool_calls.len(), "tool calls requested");

                    let mut assistant = Message::assistant().with_tool_calls(tool_calls.clone());
                    if !text.is_empty() {
                        assistant = assistant.with_text(text);
                    }
                    conversation.push(assistant);

                    // Execute in request order; each result is paired to
                    // its call id before the next request goes out
                    for call in &tool_calls {
                        let result = match &self.toolbox {
                            Some(toolbox) => toolbox.execute(&call.name, &call.arguments),
                            None => "Error: no tools are available".to_string(),
                        };
                        self.trace.log(
                            &format!("TOOL {} round={}", call.name, round),
                            &json!({"arguments": call.arguments, "result": result}),
                        );
                        conversation.push(Message::tool(call.id.clone(), result));
                    }
                }
            }
        }

        // Round budget exhausted. Withdraw tools and ask for the answer
        // in a fresh user turn: a model primed by several tool-call turns
        // keeps emitting tool calls if tools merely vanish mid-turn.
        tracing::warn!(
            max_rounds = self.max_rounds,
            "tool round budget exhausted, forcing final answer"
        );
        conversation.push(Message::user(FORCED_FINAL_PROMPT));
        self.trace.log(
            "FINAL REQUEST (tools disabled)",
            &json!({"messages": conversation}),
        );

        match self
            .provider
            .generate(&conversation, Some(system_prompt), None, params)
            .await
        {
            Ok(GenerationResponse::Text(text)) => {
                self.trace.log("FINAL RESPONSE", &text);
                Ok(text)
            }
            Ok(GenerationResponse::ToolRequest { text, .. }) => {
                self.trace.log("FINAL RESPONSE (still requesting tools)", &text);
                Ok(text)
            }
            Err(e) => {
                self.trace.log("FINAL ERROR", &e.to_string());
                Err(anyhow!("after max rounds: {e}"))
            }
        }
    }

    pub async fn cleanup(&mut self) {
        self.provider.cleanup().await;
    }
}

/// Translate a natural-language request into a single shell command.
///
/// The output is always safe to hand to a shell: a bare command on
/// success, a `# Error: ...` comment line on unrecoverable failure.
pub async fn process_query(agent: &Agent, request: &QueryRequest, params: &GenerateParams) -> String {
    let system_prompt = build_system_prompt(
        &request.cwd,
        &request.history,
        &request.shell,
        &request.os,
    );
    let messages = vec![Message::user(request.query.clone())];

    match agent.reply(messages, &system_prompt, params).await {
        Ok(text) => clean_command(&text),
        Err(e) => {
            tracing::error!("agent error: {e:#}");
            format!("# Error: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Role;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn tool_request(calls: Vec<ToolCall>) -> GenerationResponse {
        GenerationResponse::ToolRequest {
            text: String::new(),
            tool_calls: calls,
            stop_reason: "tool_calls".to_string(),
        }
    }

    fn sandbox() -> (TempDir, Toolbox) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
        let toolbox = Toolbox::new(dir.path(), 500);
        (dir, toolbox)
    }

    #[tokio::test]
    async fn test_text_on_first_round() -> Result<()> {
        let provider = MockProvider::new(vec![GenerationResponse::Text("ls -la".to_string())]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider));

        let result = agent
            .reply(
                vec![Message::user("list files")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        assert_eq!(result, "ls -la");
        assert_eq!(calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() -> Result<()> {
        let (_dir, toolbox) = sandbox();
        let provider = MockProvider::new(vec![
            tool_request(vec![ToolCall::new(
                "call_1",
                "read_file",
                json!({"path": "Cargo.toml"}),
            )]),
            GenerationResponse::Text("cargo build".to_string()),
        ]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider)).with_toolbox(toolbox);

        let result = agent
            .reply(
                vec![Message::user("build this")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;
        assert_eq!(result, "cargo build");

        // Second request must carry assistant tool_calls + paired tool result
        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        let second = &recorded[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[1].tool_calls[0].id, "call_1");
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(second[2].text().unwrap().contains("name = \"demo\""));
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_results_keep_request_order() -> Result<()> {
        let (_dir, toolbox) = sandbox();
        let provider = MockProvider::new(vec![
            tool_request(vec![
                ToolCall::new("call_a", "list_directory", json!({"path": "."})),
                ToolCall::new("call_b", "read_file", json!({"path": "Cargo.toml"})),
            ]),
            GenerationResponse::Text("done".to_string()),
        ]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider)).with_toolbox(toolbox);

        agent
            .reply(
                vec![Message::user("inspect")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        let recorded = calls.lock().unwrap();
        let second = &recorded[1].messages;
        let tool_ids: Vec<_> = second
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_ids, vec!["call_a", "call_b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_error_back() -> Result<()> {
        let (_dir, toolbox) = sandbox();
        let provider = MockProvider::new(vec![
            tool_request(vec![ToolCall::new("call_1", "delete_everything", json!({}))]),
            GenerationResponse::Text("echo safe".to_string()),
        ]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider)).with_toolbox(toolbox);

        let result = agent
            .reply(
                vec![Message::user("clean up")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        // Tool failure does not abort; the error string goes back to the model
        assert_eq!(result, "echo safe");
        let recorded = calls.lock().unwrap();
        let tool_message = recorded[1].messages.last().unwrap();
        assert!(tool_message
            .text()
            .unwrap()
            .contains("Unknown tool 'delete_everything'"));
        Ok(())
    }

    #[tokio::test]
    async fn test_forced_final_after_budget() -> Result<()> {
        let (_dir, toolbox) = sandbox();
        // max_rounds = 1 and the model immediately wants a tool
        let provider = MockProvider::new(vec![
            tool_request(vec![ToolCall::new(
                "call_1",
                "list_directory",
                json!({"path": "."}),
            )]),
            GenerationResponse::Text("ls".to_string()),
        ]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider))
            .with_toolbox(toolbox)
            .with_max_rounds(1);

        let result = agent
            .reply(
                vec![Message::user("what is here")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;
        assert_eq!(result, "ls");

        let recorded = calls.lock().unwrap();
        // max_rounds + 1 provider calls, the last with tools withdrawn
        assert_eq!(recorded.len(), 2);
        assert!(recorded[0].tools_enabled);
        assert!(!recorded[1].tools_enabled);

        // The forced final call carries a fresh user turn at the end
        let last = recorded[1].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.text().unwrap().contains("Do NOT call any tools"));
        Ok(())
    }

    #[tokio::test]
    async fn test_never_exceeds_round_budget() -> Result<()> {
        let (_dir, toolbox) = sandbox();
        // Model asks for tools forever
        let responses: Vec<_> = (0..20)
            .map(|i| {
                tool_request(vec![ToolCall::new(
                    format!("call_{i}"),
                    "list_directory",
                    json!({"path": "."}),
                )])
            })
            .collect();
        let provider = MockProvider::new(responses);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider))
            .with_toolbox(toolbox)
            .with_max_rounds(3);

        let result = agent
            .reply(
                vec![Message::user("loop forever")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        // The forced final response was another tool request; its text
        // (empty here) is still returned rather than looping on
        assert_eq!(result, "");
        assert_eq!(calls.lock().unwrap().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let agent = Agent::new(Box::new(MockProvider::failing()));
        let result = agent
            .reply(
                vec![Message::user("hi")],
                "prompt",
                &GenerateParams::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_toolbox_means_no_tools_sent() -> Result<()> {
        let provider = MockProvider::new(vec![GenerationResponse::Text("pwd".to_string())]);
        let calls = provider.calls();
        let agent = Agent::new(Box::new(provider));

        agent
            .reply(
                vec![Message::user("where am i")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        assert!(!calls.lock().unwrap()[0].tools_enabled);
        Ok(())
    }

    #[tokio::test]
    async fn test_max_rounds_has_floor_of_one() {
        let agent = Agent::new(Box::new(MockProvider::new(vec![]))).with_max_rounds(0);
        assert_eq!(agent.max_rounds, 1);
    }

    #[tokio::test]
    async fn test_process_query_normalizes_output() {
        let provider =
            MockProvider::new(vec![GenerationResponse::Text("```\nls -la\n```".to_string())]);
        let agent = Agent::new(Box::new(provider));

        let request = QueryRequest {
            query: "list everything".to_string(),
            cwd: "/tmp".to_string(),
            shell: "zsh".to_string(),
            os: "linux".to_string(),
            history: String::new(),
        };
        let result = process_query(&agent, &request, &GenerateParams::default()).await;
        assert_eq!(result, "ls -la");
    }

    #[tokio::test]
    async fn test_process_query_flags_errors_as_comment() {
        let agent = Agent::new(Box::new(MockProvider::failing()));
        let request = QueryRequest {
            query: "anything".to_string(),
            cwd: "/tmp".to_string(),
            shell: "zsh".to_string(),
            os: "linux".to_string(),
            history: String::new(),
        };
        let result = process_query(&agent, &request, &GenerateParams::default()).await;
        assert!(result.starts_with("# Error:"));
    }

    #[tokio::test]
    async fn test_trace_records_exchanges() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let trace_path = dir.path().join("debug.log");
        let provider = MockProvider::new(vec![GenerationResponse::Text("ls".to_string())]);
        let agent = Agent::new(Box::new(provider)).with_trace(Trace::at(trace_path.clone()));

        agent
            .reply(
                vec![Message::user("hi")],
                "prompt",
                &GenerateParams::default(),
            )
            .await?;

        let contents = fs::read_to_string(trace_path)?;
        assert!(contents.contains("CONVERSATION START"));
        assert!(contents.contains("REQUEST round=1/5"));
        assert!(contents.contains("RESPONSE round=1"));
        Ok(())
    }
}
