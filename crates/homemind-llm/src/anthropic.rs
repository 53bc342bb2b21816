//! HTTP backend speaking the Anthropic messages protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use homemind_core::message::{ChatMessage, ContentBlock};

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, ChatResponse, StopReason, TokenUsage, ToolSpec};

const API_VERSION: &str = "2023-06-01";
/// Reasoning calls can legitimately run long; bound them anyway.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Messages-protocol backend.
pub struct AnthropicBackend {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSpec],
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<Value>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize)]
struct WireErrorBody {
    message: String,
}

// Content arrives as a heterogeneous block list; unknown block types
// (thinking, citations, ...) are skipped rather than failing the turn.
fn parse_content(raw: Vec<Value>) -> Vec<ContentBlock> {
    raw.into_iter()
        .filter_map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") | Some("tool_use") => serde_json::from_value(block).ok(),
            other => {
                debug!(block_type = ?other, "skipping unsupported content block");
                None
            }
        })
        .collect()
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
            tools: &request.tools,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let wire: WireResponse = response.json().await?;
        Ok(ChatResponse {
            content: parse_content(wire.content),
            stop_reason: StopReason::parse(wire.stop_reason.as_deref()),
            usage: TokenUsage::new(wire.usage.input_tokens, wire.usage.output_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest {
            model: "claude-haiku-4-5".to_string(),
            system: Some("You are a test.".to_string()),
            messages: vec![ChatMessage::user("hello")],
            tools: Vec::new(),
            max_tokens: 100,
        };
        let body = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
            tools: &request.tools,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "claude-haiku-4-5");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        // Empty tool list is omitted entirely.
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_response_parsing_skips_unknown_blocks() {
        let raw = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "The door is locked."},
                {"type": "tool_use", "id": "t1", "name": "get_entity_state",
                 "input": {"entity_id": "lock.front_door"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        });
        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let content = parse_content(wire.content);
        assert_eq!(content.len(), 2);
        assert_eq!(StopReason::parse(wire.stop_reason.as_deref()), StopReason::ToolUse);
        assert_eq!(wire.usage.input_tokens, 12);
    }
}
