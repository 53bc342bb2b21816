//! Scripted backend for tests.
//!
//! Responses are queued in advance and returned in order; the final queued
//! response repeats once the queue is exhausted, which makes "always asks
//! for a tool" loops trivial to script.

use std::sync::Mutex;

use async_trait::async_trait;

use homemind_core::message::ContentBlock;

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, ChatResponse, StopReason, TokenUsage};

/// In-memory backend driven by a scripted response queue.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<Vec<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
    fail: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every call fails, for fallback-path tests.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queue a response.
    pub fn push(&self, response: ChatResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Queue a plain-text end-turn response.
    pub fn push_text(&self, text: &str, usage: TokenUsage) {
        self.push(ChatResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage,
        });
    }

    /// Queue a tool-use response.
    pub fn push_tool_use(&self, name: &str, input: serde_json::Value, usage: TokenUsage) {
        self.push(ChatResponse {
            content: vec![ContentBlock::ToolUse {
                id: format!("call_{name}"),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage,
        });
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(LlmError::InvalidResponse("scripted failure".to_string()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::InvalidResponse(
                "mock backend has no scripted responses".to_string(),
            ));
        }
        if responses.len() == 1 {
            // Repeat the last response so unbounded loops stay scripted.
            Ok(responses[0].clone())
        } else {
            Ok(responses.remove(0))
        }
    }
}
