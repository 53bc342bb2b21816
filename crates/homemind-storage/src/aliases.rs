//! User-taught entity aliases.
//!
//! Resolution order:
//! 1. Exact normalized alias match (O(1)).
//! 2. Fuzzy match over alias keys (score ≥ 80).
//! 3. Fuzzy match over cached entity metadata (score ≥ 70).
//! 4. None — the caller asks for clarification.
//!
//! Exact and curated aliases always beat raw fuzzy matches against live
//! metadata: aliases encode user-confirmed intent.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use homemind_core::entity::domain_of;

use crate::cache::EntityCache;
use crate::error::Result;
use crate::persist;

/// Minimum score for a fuzzy match against alias keys.
const ALIAS_FUZZY_THRESHOLD: u8 = 80;
/// Minimum score for the fallback fuzzy match against cached metadata.
const CACHE_FUZZY_THRESHOLD: u8 = 70;

/// Persisted nickname → entity-id mappings with fuzzy fallback.
///
/// The backing file is a flat JSON object; `BTreeMap` keeps it sorted by key
/// so rewrites diff cleanly. Every mutation rewrites and persists the whole
/// document synchronously.
pub struct AliasStore {
    path: PathBuf,
    aliases: BTreeMap<String, String>,
}

fn normalize(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

impl AliasStore {
    /// Open the store, loading any persisted mappings.
    pub fn open(path: PathBuf) -> Self {
        let aliases = match persist::load_json::<BTreeMap<String, String>>(&path) {
            Ok(Some(aliases)) => {
                info!(count = aliases.len(), "loaded aliases from {}", path.display());
                aliases
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("failed to load aliases, starting empty: {e}");
                BTreeMap::new()
            }
        };
        Self { path, aliases }
    }

    /// Resolve a user phrase to an entity id.
    pub fn resolve(&self, phrase: &str, cache: &EntityCache) -> Option<String> {
        let normalized = normalize(phrase);

        if let Some(entity_id) = self.aliases.get(&normalized) {
            debug!("exact alias match: '{phrase}' -> '{entity_id}'");
            return Some(entity_id.clone());
        }

        if let Some(entity_id) = crate::fuzzy::best_match(
            &normalized,
            self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            ALIAS_FUZZY_THRESHOLD,
        ) {
            debug!("fuzzy alias match: '{phrase}' -> '{entity_id}'");
            return Some(entity_id.to_string());
        }

        if let Some(entity_id) = cache.find_entity(phrase, CACHE_FUZZY_THRESHOLD) {
            debug!("cache fuzzy match: '{phrase}' -> '{entity_id}'");
            return Some(entity_id);
        }

        debug!("no match for '{phrase}'");
        None
    }

    /// Save an alias mapping. Returns false (and does not persist) when the
    /// identical mapping already exists. Pointing an existing alias at a
    /// different entity overwrites it — last write wins.
    pub fn learn(&mut self, alias: &str, entity_id: &str) -> Result<bool> {
        let normalized = normalize(alias);
        if self.aliases.get(&normalized).is_some_and(|id| id == entity_id) {
            debug!("alias already known: '{alias}' -> '{entity_id}'");
            return Ok(false);
        }
        self.aliases.insert(normalized, entity_id.to_string());
        self.save()?;
        info!("learned alias: '{alias}' -> '{entity_id}'");
        Ok(true)
    }

    /// Remove an alias; returns whether anything was removed.
    pub fn remove(&mut self, alias: &str) -> Result<bool> {
        if self.aliases.remove(&normalize(alias)).is_some() {
            self.save()?;
            info!("removed alias: '{alias}'");
            return Ok(true);
        }
        Ok(false)
    }

    /// All mappings, sorted by alias.
    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Aliases pointing at one entity.
    pub fn aliases_for_entity(&self, entity_id: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, id)| id.as_str() == entity_id)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Per-domain counts, for the agent system preamble.
    pub fn summary(&self) -> String {
        if self.aliases.is_empty() {
            return "No entity aliases configured.".to_string();
        }
        let mut by_domain: BTreeMap<&str, usize> = BTreeMap::new();
        for entity_id in self.aliases.values() {
            let domain = domain_of(entity_id).unwrap_or("other");
            *by_domain.entry(domain).or_default() += 1;
        }
        let parts: Vec<String> = by_domain
            .iter()
            .map(|(domain, count)| format!("{domain}: {count} aliases"))
            .collect();
        format!("Known aliases: {}", parts.join(", "))
    }

    fn save(&self) -> Result<()> {
        persist::save_json(&self.path, &self.aliases)
    }
}
