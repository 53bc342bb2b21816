//! The intent-resolution pipeline and agent loop.
//!
//! Control flow per user message:
//!
//! ```text
//! budget gate → intent extractor ──simple──→ direct executor ──→ reply
//!                     │                            │
//!                     └──complex──→ tool selector  └─(unresolved)─┐
//!                                        │                        │
//!                                        ▼                        ▼
//!                                   agent loop ──────────────→ reply
//! ```
//!
//! The fast path is opportunistic: any ambiguity, parse failure, or backend
//! error degrades to the full tool-calling loop, never to a user-visible
//! error.

pub mod agent;
pub mod context;
pub mod executor;
pub mod history;
pub mod intent;
pub mod pipeline;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testutil;
pub mod tools;

pub use agent::{AgentOutcome, run_agent};
pub use context::AgentContext;
pub use executor::Responder;
pub use history::HistoryStore;
pub use intent::{ExtractedIntent, IntentKind, IntentOutcome, extract_intent};
pub use pipeline::{TurnReply, handle_message};
pub use scheduler::{Notifier, ScheduledJob, build_jobs, run_scheduler};
