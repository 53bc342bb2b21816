//! Test harness wiring mocks into a real [`AgentContext`].

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use homemind_core::entity::Entity;
use homemind_hass::HomeAssistant;
use homemind_hass::mock::MockHass;
use homemind_llm::LlmBackend;
use homemind_llm::mock::MockBackend;
use homemind_storage::{AliasStore, EntityCache, UsageTracker};

use crate::context::AgentContext;
use crate::executor::Responder;

pub struct TestHarness {
    pub ctx: Arc<AgentContext>,
    pub hass: Arc<MockHass>,
    pub llm: Arc<MockBackend>,
    _dir: tempfile::TempDir,
}

/// Build a context backed by mocks, with the cache refreshed from the given
/// entities and a seeded responder for deterministic templates.
pub async fn harness(entities: Vec<Entity>) -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let hass = Arc::new(MockHass::with_entities(entities));
    let llm = Arc::new(MockBackend::new());

    let mut cache = EntityCache::open(dir.path().join("cache.json"), 6);
    cache.refresh(hass.as_ref()).await.unwrap();

    let ctx = Arc::new(AgentContext::new(
        hass.clone() as Arc<dyn HomeAssistant>,
        llm.clone() as Arc<dyn LlmBackend>,
        Arc::new(RwLock::new(cache)),
        Arc::new(Mutex::new(AliasStore::open(dir.path().join("aliases.json")))),
        Arc::new(Mutex::new(UsageTracker::open(dir.path().join("usage.json")))),
        "claude-sonnet-4-5".to_string(),
        10,
    ));
    *ctx.responder.lock().await = Responder::with_seed(42);

    TestHarness {
        ctx,
        hass,
        llm,
        _dir: dir,
    }
}
