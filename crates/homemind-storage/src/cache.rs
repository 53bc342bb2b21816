//! Entity-metadata cache.
//!
//! Metadata (ids, display names, domains, device classes, available services)
//! changes rarely relative to state, so it is snapshotted wholesale on an
//! interval and used for disambiguation without hitting the live API on
//! every turn. Live state is never cached here.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use homemind_core::entity::Entity;
use homemind_hass::HomeAssistant;

use crate::fuzzy;
use crate::persist;

/// On-disk snapshot of the platform's slow-changing metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub services: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub areas: Vec<Value>,
    #[serde(default)]
    pub devices: Vec<Value>,
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Refreshable snapshot of entity metadata.
pub struct EntityCache {
    path: PathBuf,
    refresh_interval: Duration,
    snapshot: EntitySnapshot,
}

impl EntityCache {
    /// Open the cache, loading any snapshot persisted by a previous run so a
    /// restart does not force an immediate refresh.
    pub fn open(path: PathBuf, refresh_interval_hours: u64) -> Self {
        let snapshot = match persist::load_json::<EntitySnapshot>(&path) {
            Ok(Some(snapshot)) => {
                info!(
                    entities = snapshot.entities.len(),
                    "loaded entity cache from {}",
                    path.display()
                );
                snapshot
            }
            Ok(None) => EntitySnapshot::default(),
            Err(e) => {
                warn!("failed to load entity cache, starting empty: {e}");
                EntitySnapshot::default()
            }
        };
        Self {
            path,
            refresh_interval: Duration::hours(refresh_interval_hours as i64),
            snapshot,
        }
    }

    /// Whether the snapshot has never been taken or has aged out.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.snapshot.last_refresh {
            Some(last) => now - last >= self.refresh_interval,
            None => true,
        }
    }

    /// Replace the entire snapshot from the external API in one pass.
    ///
    /// Any partial failure aborts the whole refresh — the previous snapshot
    /// stays in place and the error surfaces to the caller.
    pub async fn refresh(&mut self, source: &dyn HomeAssistant) -> homemind_core::Result<()> {
        info!("refreshing entity cache");
        let entities = source.get_entity_registry().await?;
        let services = source.get_services().await?;
        let areas = source.get_areas().await?;
        let devices = source.get_devices().await?;

        self.snapshot = EntitySnapshot {
            entities,
            services,
            areas,
            devices,
            last_refresh: Some(Utc::now()),
        };
        persist::save_json(&self.path, &self.snapshot).map_err(homemind_core::Error::from)?;
        info!(entities = self.snapshot.entities.len(), "entity cache refreshed");
        Ok(())
    }

    /// Fuzzy-match a phrase to an entity id across display names and id
    /// name-segments.
    pub fn find_entity(&self, phrase: &str, threshold: u8) -> Option<String> {
        let mut candidates: Vec<(String, &str)> = Vec::new();
        for entity in &self.snapshot.entities {
            if !entity.friendly_name.is_empty() {
                candidates.push((entity.friendly_name.clone(), entity.entity_id.as_str()));
            }
            candidates.push((entity.name_segment(), entity.entity_id.as_str()));
        }
        fuzzy::best_match(
            phrase,
            candidates.iter().map(|(name, id)| (name.as_str(), *id)),
            threshold,
        )
        .map(str::to_string)
    }

    /// Point lookup by exact id.
    pub fn get_entity(&self, entity_id: &str) -> Option<&Entity> {
        self.snapshot
            .entities
            .iter()
            .find(|e| e.entity_id == entity_id)
    }

    /// All entities, optionally filtered by domain. No fuzziness.
    pub fn get_entities(&self, domain: Option<&str>) -> Vec<&Entity> {
        self.snapshot
            .entities
            .iter()
            .filter(|e| domain.is_none_or(|d| e.domain == d))
            .collect()
    }

    /// Distinct domains present in the snapshot, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .snapshot
            .entities
            .iter()
            .map(|e| e.domain.clone())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    /// Per-domain counts, for the agent system preamble.
    pub fn entity_summary(&self) -> String {
        if self.snapshot.entities.is_empty() {
            return "No cached entities.".to_string();
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entity in &self.snapshot.entities {
            *counts.entry(entity.domain.as_str()).or_default() += 1;
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(domain, count)| format!("{count} {domain}"))
            .collect();
        format!("Cached entities: {}", parts.join(", "))
    }

    pub fn entity_count(&self) -> usize {
        self.snapshot.entities.len()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.snapshot.last_refresh
    }

    /// Areas from the snapshot (empty over the REST API).
    pub fn areas(&self) -> &[Value] {
        &self.snapshot.areas
    }

    #[cfg(test)]
    pub(crate) fn with_snapshot(path: PathBuf, snapshot: EntitySnapshot) -> Self {
        Self {
            path,
            refresh_interval: Duration::hours(6),
            snapshot,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_snapshot(entities: Vec<Entity>) -> EntitySnapshot {
    EntitySnapshot {
        entities,
        last_refresh: Some(Utc::now()),
        ..EntitySnapshot::default()
    }
}
