//! Persistent state for HomeMind: learned aliases, the entity-metadata
//! snapshot, and daily token usage.
//!
//! Every store is a whole-document JSON file rewritten atomically
//! (temp-file-then-rename) on mutation. Write volume is low — durability
//! wins over throughput.

pub mod aliases;
pub mod cache;
pub mod error;
pub mod fuzzy;
pub mod persist;
pub mod usage;

pub use aliases::AliasStore;
pub use cache::{EntityCache, EntitySnapshot};
pub use error::{Result, StorageError};
pub use usage::{BudgetStatus, DailyUsage, UsagePolicy, UsageTracker};
