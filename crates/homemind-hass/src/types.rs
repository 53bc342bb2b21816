//! Wire types for the Home Assistant REST API.

use serde::{Deserialize, Serialize};

/// Live state of one entity, as returned by `/api/states`.
///
/// State is deliberately not cached anywhere — it changes fast relative to
/// metadata and control decisions must see the live value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl EntityState {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Display name, falling back to the entity id.
    pub fn friendly_name(&self) -> &str {
        self.attribute("friendly_name").unwrap_or(&self.entity_id)
    }

    /// Unit of measurement attribute, when present (sensors mostly).
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.attribute("unit_of_measurement")
    }

    /// Device class attribute, when present.
    pub fn device_class(&self) -> Option<&str> {
        self.attribute("device_class")
    }
}

/// One state change in an entity's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: String,
    #[serde(default)]
    pub last_changed: Option<String>,
}

/// Best-effort automation definition for the config API.
///
/// Deliberately thin: trigger/condition/action pass through as raw JSON, the
/// platform validates them. HomeMind is not an automation planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSpec {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: serde_json::Value,
    #[serde(default = "empty_list", skip_serializing_if = "serde_json::Value::is_null")]
    pub condition: serde_json::Value,
    pub action: serde_json::Value,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn empty_list() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn default_mode() -> String {
    "single".to_string()
}
