//! Tool palette, selection, and execution for the agent loop.
//!
//! The palette is organized into capability groups; the selector exposes
//! only the groups a message plausibly needs, shrinking the tool list
//! offered to the backend per turn.

pub mod exec;
pub mod palette;
pub mod selector;

pub use exec::execute_tool;
pub use palette::{ToolGroup, full_palette, palette_for};
pub use selector::{select_groups, select_tools};
