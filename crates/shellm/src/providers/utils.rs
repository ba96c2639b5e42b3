use anyhow::Result;
use serde_json::{json, Value};

use super::base::GenerationResponse;
use crate::errors::AgentError;
use crate::models::message::{Message, Role};
use crate::models::tool::{Tool, ToolCall};

/// Convert canonical messages to the OpenAI-compatible wire format.
///
/// A system message built from `system_prompt` is prepended only when
/// the history does not already carry one (first system wins).
pub fn messages_to_wire(messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
    let mut wire = Vec::new();

    let has_system = messages.iter().any(|m| m.role == Role::System);
    if let Some(system) = system_prompt {
        if !system.is_empty() && !has_system {
            wire.push(json!({"role": "system", "content": system}));
        }
    }

    for message in messages {
        match message.role {
            Role::System => {
                wire.push(json!({
                    "role": "system",
                    "content": message.text().unwrap_or_default(),
                }));
            }
            Role::User => {
                // List-of-parts user content is flattened to plain text
                wire.push(json!({
                    "role": "user",
                    "content": message.text().unwrap_or_default(),
                }));
            }
            Role::Assistant => {
                // Some wire formats reject an empty content string next
                // to tool calls; content must be null in that case.
                let text = message
                    .text()
                    .filter(|t| !(t.is_empty() && !message.tool_calls.is_empty()));
                let mut converted = json!({"role": "assistant", "content": text});
                if !message.tool_calls.is_empty() {
                    let calls: Vec<Value> =
                        message.tool_calls.iter().map(tool_call_to_wire).collect();
                    converted["tool_calls"] = json!(calls);
                }
                wire.push(converted);
            }
            Role::Tool => {
                // TODO a missing id is a protocol violation upstream and
                // should probably fail loudly; for now "unknown" keeps the
                // request well-formed.
                let id = message
                    .tool_call_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                wire.push(json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": message.text().unwrap_or_default(),
                }));
            }
        }
    }

    wire
}

fn tool_call_to_wire(call: &ToolCall) -> Value {
    // Arguments travel as a string encoding, unless already a string
    let arguments = match &call.arguments {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": arguments,
        }
    })
}

/// Convert canonical tool schemas to the OpenAI function-calling format
pub fn tools_to_wire(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(AgentError::DuplicateTool(tool.name.clone()).into());
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert a wire response into a GenerationResponse.
///
/// Tool-call directives win over text; a response with neither text
/// content nor tool calls is a failure condition.
pub fn response_to_generation(response: &Value) -> Result<GenerationResponse> {
    let choice = &response["choices"][0];
    let message = &choice["message"];

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    if let Some(calls) = message.get("tool_calls").and_then(|tc| tc.as_array()) {
        if !calls.is_empty() {
            let tool_calls = calls.iter().map(parse_wire_tool_call).collect();
            let stop_reason = choice["finish_reason"]
                .as_str()
                .unwrap_or("tool_calls")
                .to_string();
            return Ok(GenerationResponse::ToolRequest {
                text,
                tool_calls,
                stop_reason,
            });
        }
    }

    if message.get("content").and_then(|c| c.as_str()).is_none() {
        return Err(AgentError::NoContent.into());
    }

    Ok(GenerationResponse::Text(text))
}

fn parse_wire_tool_call(call: &Value) -> ToolCall {
    let id = call["id"].as_str().unwrap_or_default().to_string();
    let name = call["function"]["name"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let arguments = parse_arguments(&call["function"]["arguments"]);
    ToolCall::new(id, name, arguments)
}

/// Arguments usually arrive as a JSON-encoded string. A string that
/// fails to decode is kept as the raw string rather than rejected; the
/// tool dispatch reports the bad shape back to the model.
fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        other => other.clone(),
    }
}
