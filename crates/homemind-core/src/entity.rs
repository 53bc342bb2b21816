//! Entity model for the smart-home platform.
//!
//! Entities are identified by a namespaced string `"<domain>.<name>"`
//! (`light.kitchen_main`, `lock.front_door`). The domain prefix is the
//! category tag used for service routing and directory grouping.

use serde::{Deserialize, Serialize};

/// Domains listed first (and with a larger cap) when building the condensed
/// entity directory for intent extraction.
pub const PRIORITY_DOMAINS: [&str; 7] = [
    "light", "switch", "lock", "sensor", "climate", "cover", "fan",
];

/// A device/sensor record from the smart-home platform.
///
/// Owned by the entity cache; refreshed wholesale from the external API and
/// read-only to every other component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Namespaced identifier, `"<domain>.<name>"`.
    pub entity_id: String,
    /// Human-readable display name.
    pub friendly_name: String,
    /// Category tag (light, lock, sensor, climate, ...).
    pub domain: String,
    /// Optional sub-type (e.g. `door`, `temperature`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

impl Entity {
    /// Create an entity, deriving the domain from the id.
    pub fn new(entity_id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let domain = domain_of(&entity_id).unwrap_or("").to_string();
        Self {
            entity_id,
            friendly_name: friendly_name.into(),
            domain,
            device_class: None,
        }
    }

    /// The id without its domain prefix, underscores replaced by spaces.
    /// Used as a secondary candidate pool for fuzzy matching.
    pub fn name_segment(&self) -> String {
        name_of(&self.entity_id).unwrap_or("").replace('_', " ")
    }
}

/// Domain prefix of an entity id, if it has one.
pub fn domain_of(entity_id: &str) -> Option<&str> {
    entity_id.split_once('.').map(|(domain, _)| domain)
}

/// Name segment of an entity id, if it has one.
pub fn name_of(entity_id: &str) -> Option<&str> {
    entity_id.split_once('.').map(|(_, name)| name)
}

/// Whether a reference already looks like an entity id rather than a
/// natural-language phrase.
pub fn looks_like_entity_id(reference: &str) -> bool {
    reference.contains('.') && !reference.contains(' ')
}

/// Coerce an identifier into the given domain's namespace.
///
/// Ids already in the namespace pass through unchanged; ids in another
/// namespace have their domain swapped; bare names get the prefix added.
pub fn coerce_domain(entity_id: &str, domain: &str) -> String {
    match domain_of(entity_id) {
        Some(d) if d == domain => entity_id.to_string(),
        Some(_) => format!("{}.{}", domain, name_of(entity_id).unwrap_or(entity_id)),
        None => format!("{}.{}", domain, entity_id),
    }
}
