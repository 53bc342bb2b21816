//! Core types shared across the HomeMind workspace.
//!
//! This crate defines the foundational abstractions used by every other
//! crate: the unified error type, the entity model, the chat transcript
//! model, and configuration loading.

pub mod config;
pub mod entity;
pub mod error;
pub mod message;

pub use config::{AppConfig, ScheduleTask};
pub use entity::{Entity, coerce_domain, domain_of, looks_like_entity_id};
pub use error::{Error, Result};
pub use message::{ChatMessage, ContentBlock, Role};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::entity::Entity;
    pub use crate::error::{Error, Result};
    pub use crate::message::{ChatMessage, ContentBlock, Role};
}
