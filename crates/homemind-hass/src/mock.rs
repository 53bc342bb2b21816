//! Scripted Home Assistant implementation for tests.
//!
//! Holds entities and live states in memory, records every service call,
//! and can be switched into failure modes to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use homemind_core::entity::{Entity, domain_of};

use crate::api::HomeAssistant;
use crate::error::{HassError, Result};
use crate::types::{AutomationSpec, EntityState, HistoryEntry};

/// A recorded `call_service` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub entity_id: Option<String>,
    pub data: Option<Value>,
}

/// In-memory Home Assistant double.
#[derive(Default)]
pub struct MockHass {
    entities: Mutex<Vec<Entity>>,
    states: Mutex<HashMap<String, EntityState>>,
    history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    calls: Mutex<Vec<ServiceCall>>,
    /// When set, service calls and state fetches fail with a 500.
    pub fail_calls: AtomicBool,
    /// When set, metadata fetches fail, aborting cache refreshes.
    pub fail_metadata: AtomicBool,
}

impl MockHass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed entities, deriving an `on` live state for each.
    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let mock = Self::new();
        for entity in &entities {
            mock.set_state(EntityState {
                entity_id: entity.entity_id.clone(),
                state: "on".to_string(),
                attributes: serde_json::json!({"friendly_name": entity.friendly_name}),
            });
        }
        *mock.entities.lock().unwrap() = entities;
        mock
    }

    /// Insert or replace a live state.
    pub fn set_state(&self, state: EntityState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.entity_id.clone(), state);
    }

    /// Seed history for an entity.
    pub fn set_history(&self, entity_id: &str, entries: Vec<HistoryEntry>) {
        self.history
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), entries);
    }

    /// Every service call recorded so far.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn failing(&self) -> bool {
        self.fail_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HomeAssistant for MockHass {
    async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        if self.failing() {
            return Err(HassError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        self.states
            .lock()
            .unwrap()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| HassError::Status {
                status: 404,
                body: format!("unknown entity {entity_id}"),
            })
    }

    async fn get_states(&self, domain: Option<&str>) -> Result<Vec<EntityState>> {
        if self.failing() {
            return Err(HassError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        let mut states: Vec<EntityState> = self.states.lock().unwrap().values().cloned().collect();
        if let Some(domain) = domain {
            states.retain(|s| domain_of(&s.entity_id) == Some(domain));
        }
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(states)
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: Option<&str>,
        data: Option<Value>,
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(ServiceCall {
            domain: domain.to_string(),
            service: service.to_string(),
            entity_id: entity_id.map(str::to_string),
            data,
        });
        if self.failing() {
            return Err(HassError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        Ok(Value::Array(Vec::new()))
    }

    async fn get_history(&self, entity_id: &str, _hours: u32) -> Result<Vec<Vec<HistoryEntry>>> {
        let history = self.history.lock().unwrap();
        Ok(match history.get(entity_id) {
            Some(entries) => vec![entries.clone()],
            None => Vec::new(),
        })
    }

    async fn get_entity_registry(&self) -> Result<Vec<Entity>> {
        if self.fail_metadata.load(Ordering::Relaxed) {
            return Err(HassError::Status {
                status: 500,
                body: "scripted metadata failure".to_string(),
            });
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn get_services(&self) -> Result<BTreeMap<String, Vec<String>>> {
        if self.fail_metadata.load(Ordering::Relaxed) {
            return Err(HassError::Status {
                status: 500,
                body: "scripted metadata failure".to_string(),
            });
        }
        let mut services = BTreeMap::new();
        services.insert(
            "light".to_string(),
            vec!["turn_on".to_string(), "turn_off".to_string(), "toggle".to_string()],
        );
        services.insert(
            "lock".to_string(),
            vec!["lock".to_string(), "unlock".to_string()],
        );
        Ok(services)
    }

    async fn get_areas(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn get_devices(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn trigger_automation(&self, entity_id: &str) -> Result<()> {
        self.call_service("automation", "trigger", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn create_automation(&self, spec: AutomationSpec) -> Result<String> {
        if self.failing() {
            return Err(HassError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        Ok(format!("mock_{}", spec.alias.to_lowercase().replace(' ', "_")))
    }

    async fn list_automations(&self) -> Result<Vec<EntityState>> {
        self.get_states(Some("automation")).await
    }

    async fn delete_automation(&self, _config_id: &str) -> Result<()> {
        if self.failing() {
            return Err(HassError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn check_connection(&self) -> bool {
        !self.failing()
    }
}
