//! Reasoning backend abstraction.
//!
//! A single call type: (model, system preamble, transcript, tool palette) →
//! text and/or tool-invocation blocks plus per-call token counts. The
//! [`LlmBackend`] trait is the seam; [`AnthropicBackend`] speaks the
//! messages protocol over HTTP, and [`mock::MockBackend`] drives tests with
//! scripted responses.

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod mock;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use backend::LlmBackend;
pub use error::{LlmError, Result};
pub use types::{ChatRequest, ChatResponse, StopReason, TokenUsage, ToolSpec};
