//! The reasoning-backend trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// A tool-calling reasoning backend.
///
/// Implementations must report per-call token usage; the agent loop and the
/// intent extractor sum these into the usage governor.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}
