//! The Home Assistant collaborator trait.
//!
//! Components program against this seam so tests can substitute a scripted
//! implementation instead of a live platform.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use homemind_core::entity::{Entity, domain_of};

use crate::error::Result;
use crate::types::{AutomationSpec, EntityState, HistoryEntry};

/// Remote smart-home API. Every call may fail with a network/HTTP error the
/// caller must handle.
#[async_trait]
pub trait HomeAssistant: Send + Sync {
    /// Current state of a single entity.
    async fn get_state(&self, entity_id: &str) -> Result<EntityState>;

    /// All entity states, optionally filtered by domain.
    async fn get_states(&self, domain: Option<&str>) -> Result<Vec<EntityState>>;

    /// Call an arbitrary service. Returns the states the call changed.
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: Option<&str>,
        data: Option<Value>,
    ) -> Result<Value>;

    /// State history for an entity over the past `hours`.
    async fn get_history(&self, entity_id: &str, hours: u32) -> Result<Vec<Vec<HistoryEntry>>>;

    /// Entity metadata for the cache: id, display name, domain, device class.
    async fn get_entity_registry(&self) -> Result<Vec<Entity>>;

    /// Available services grouped by domain.
    async fn get_services(&self) -> Result<BTreeMap<String, Vec<String>>>;

    /// Areas/rooms. Empty via the REST API.
    async fn get_areas(&self) -> Result<Vec<Value>>;

    /// Devices. Empty via the REST API.
    async fn get_devices(&self) -> Result<Vec<Value>>;

    /// Trigger an automation by entity id.
    async fn trigger_automation(&self, entity_id: &str) -> Result<()>;

    /// Create an automation, returning its config id.
    async fn create_automation(&self, spec: AutomationSpec) -> Result<String>;

    /// All automation entities with their current state.
    async fn list_automations(&self) -> Result<Vec<EntityState>>;

    /// Delete an automation by config id.
    async fn delete_automation(&self, config_id: &str) -> Result<()>;

    /// Whether the API is reachable and authenticated.
    async fn check_connection(&self) -> bool;

    // Convenience wrappers. Domain is derived from the entity id so
    // `switch.fan` routes through the switch services.

    async fn turn_on(&self, entity_id: &str, data: Option<Value>) -> Result<()> {
        let domain = domain_of(entity_id).unwrap_or("homeassistant");
        self.call_service(domain, "turn_on", Some(entity_id), data)
            .await?;
        Ok(())
    }

    async fn turn_off(&self, entity_id: &str) -> Result<()> {
        let domain = domain_of(entity_id).unwrap_or("homeassistant");
        self.call_service(domain, "turn_off", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn toggle(&self, entity_id: &str) -> Result<()> {
        let domain = domain_of(entity_id).unwrap_or("homeassistant");
        self.call_service(domain, "toggle", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn lock(&self, entity_id: &str) -> Result<()> {
        self.call_service("lock", "lock", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn unlock(&self, entity_id: &str) -> Result<()> {
        self.call_service("lock", "unlock", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn set_climate(
        &self,
        entity_id: &str,
        temperature: Option<f64>,
        hvac_mode: Option<&str>,
    ) -> Result<()> {
        let mut data = serde_json::Map::new();
        if let Some(temperature) = temperature {
            data.insert("temperature".to_string(), temperature.into());
        }
        if let Some(mode) = hvac_mode {
            data.insert("hvac_mode".to_string(), mode.into());
        }
        self.call_service(
            "climate",
            "set_temperature",
            Some(entity_id),
            Some(Value::Object(data)),
        )
        .await?;
        Ok(())
    }
}
