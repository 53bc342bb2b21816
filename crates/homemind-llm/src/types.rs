//! Request/response types for the reasoning backend.

use serde::{Deserialize, Serialize};

use homemind_core::message::{ChatMessage, ContentBlock};

/// Tool definition exposed to the backend for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Parameters as JSON Schema.
    pub input_schema: serde_json::Value,
}

/// One backend invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// A minimal single-message request with no tools.
    pub fn simple(model: impl Into<String>, text: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: vec![ChatMessage::user(text)],
            tools: Vec::new(),
            max_tokens,
        }
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Finished with a final answer.
    EndTurn,
    /// Requested one or more tool invocations.
    ToolUse,
    /// Hit the output token cap.
    MaxTokens,
    /// Anything else the protocol reports.
    Other(String),
}

impl StopReason {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some(other) => StopReason::Other(other.to_string()),
        }
    }
}

/// Token counts for one call, and the running sum across a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another call's counts.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One backend reply.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// The tool invocations requested by this reply, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Whether this reply requests tool execution rather than ending the turn.
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse && !self.tool_uses().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(StopReason::parse(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(StopReason::parse(None), StopReason::EndTurn);
        assert_eq!(
            StopReason::parse(Some("refusal")),
            StopReason::Other("refusal".to_string())
        );
    }

    #[test]
    fn test_usage_accumulation() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage::new(100, 20));
        total.add(TokenUsage::new(50, 5));
        assert_eq!(total.input_tokens, 150);
        assert_eq!(total.output_tokens, 25);
        assert_eq!(total.total(), 175);
    }

    #[test]
    fn test_tool_use_extraction() {
        let response = ChatResponse {
            content: vec![
                ContentBlock::Text {
                    text: "Checking.".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "get_entity_state".to_string(),
                    input: serde_json::json!({"entity_id": "lock.front_door"}),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        };
        assert!(response.wants_tools());
        assert_eq!(response.tool_uses().len(), 1);
        assert_eq!(response.text(), "Checking.");
    }
}
