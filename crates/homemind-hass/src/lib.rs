//! Home Assistant REST API collaborator.
//!
//! All device control in HomeMind is mediated by this remote API, treated as
//! authoritative. The [`HomeAssistant`] trait is the seam every other crate
//! programs against; [`HassClient`] is the reqwest-backed implementation.

pub mod api;
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use api::HomeAssistant;
pub use client::HassClient;
pub use error::{HassError, Result};
pub use types::{AutomationSpec, EntityState, HistoryEntry};
