//! Shared dependency context.
//!
//! Everything a conversation turn needs is constructed once at process start
//! and passed in here — no global singletons, so tests run against isolated
//! instances.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use homemind_core::entity::looks_like_entity_id;
use homemind_hass::HomeAssistant;
use homemind_llm::LlmBackend;
use homemind_storage::{AliasStore, EntityCache, UsageTracker};

use crate::executor::Responder;
use crate::history::HistoryStore;

/// Dependencies shared by the extractor, executors, tools, and loop.
///
/// Lock ordering where both are held: entity cache before alias store.
pub struct AgentContext {
    pub hass: Arc<dyn HomeAssistant>,
    pub llm: Arc<dyn LlmBackend>,
    pub cache: Arc<RwLock<EntityCache>>,
    pub aliases: Arc<Mutex<AliasStore>>,
    pub usage: Arc<Mutex<UsageTracker>>,
    pub history: HistoryStore,
    /// Current model id; switchable at runtime via the admin command.
    pub model: RwLock<String>,
    pub responder: Mutex<Responder>,
}

impl AgentContext {
    pub fn new(
        hass: Arc<dyn HomeAssistant>,
        llm: Arc<dyn LlmBackend>,
        cache: Arc<RwLock<EntityCache>>,
        aliases: Arc<Mutex<AliasStore>>,
        usage: Arc<Mutex<UsageTracker>>,
        model: String,
        max_history: usize,
    ) -> Self {
        Self {
            hass,
            llm,
            cache,
            aliases,
            usage,
            history: HistoryStore::new(max_history),
            model: RwLock::new(model),
            responder: Mutex::new(Responder::new()),
        }
    }

    /// The model id to use for the next backend call.
    pub async fn current_model(&self) -> String {
        self.model.read().await.clone()
    }

    /// Resolve an entity reference: ids pass through, phrases go through the
    /// alias store's three-tier cascade. Unresolvable references come back
    /// unchanged and the platform reports the miss.
    pub async fn resolve_entity(&self, reference: &str) -> String {
        if looks_like_entity_id(reference) {
            return reference.to_string();
        }
        let cache = self.cache.read().await;
        let aliases = self.aliases.lock().await;
        aliases
            .resolve(reference, &cache)
            .unwrap_or_else(|| reference.to_string())
    }
}
