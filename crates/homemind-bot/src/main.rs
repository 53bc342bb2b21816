//! HomeMind daemon: wire the dependency context, verify connectivity,
//! start the scheduler, and run the Telegram bot.

mod bot;
mod commands;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use tracing_subscriber::EnvFilter;

use homemind_agent::{AgentContext, build_jobs, run_scheduler};
use homemind_core::AppConfig;
use homemind_hass::{HassClient, HomeAssistant};
use homemind_llm::{AnthropicBackend, LlmBackend};
use homemind_storage::{AliasStore, EntityCache, UsageTracker};

use crate::bot::{Bot, BotNotifier};
use crate::telegram::TelegramApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("HOMEMIND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    info!("loading config from {}", config_path.display());
    let config = AppConfig::load(&config_path).context("configuration error")?;
    info!("config loaded, model: {}", config.llm.model);

    let hass = Arc::new(
        HassClient::new(&config.hass.url, config.hass.token.expose())
            .context("Home Assistant client")?,
    );
    if !hass.check_connection().await {
        anyhow::bail!("cannot reach Home Assistant at {}", config.hass.url);
    }
    info!("Home Assistant connection successful");

    let data_dir = &config.cache.data_dir;
    let mut cache = EntityCache::open(
        data_dir.join("entity_cache.json"),
        config.cache.refresh_interval_hours,
    );
    if cache.needs_refresh() {
        cache
            .refresh(hass.as_ref() as &dyn HomeAssistant)
            .await
            .context("initial entity cache refresh")?;
    } else {
        info!("using cached metadata: {}", cache.entity_summary());
    }

    let aliases = AliasStore::open(data_dir.join("aliases.json"));
    let usage = UsageTracker::open(data_dir.join("usage.json"));
    let llm = Arc::new(
        AnthropicBackend::new(&config.llm.endpoint, config.llm.api_key.expose())
            .context("reasoning backend client")?,
    );

    let ctx = Arc::new(AgentContext::new(
        hass.clone() as Arc<dyn HomeAssistant>,
        llm as Arc<dyn LlmBackend>,
        Arc::new(RwLock::new(cache)),
        Arc::new(Mutex::new(aliases)),
        Arc::new(Mutex::new(usage)),
        config.llm.model.clone(),
        config.llm.max_history,
    ));

    let jobs = build_jobs(&config.schedules).context("schedule definitions")?;
    info!("scheduler initialized with {} tasks", jobs.len());

    let api = Arc::new(
        TelegramApi::new(config.telegram.token.expose()).context("telegram client")?,
    );
    let notifier = Arc::new(BotNotifier::new(
        api.clone(),
        config.telegram.notification_chat_id,
    ));
    run_scheduler(ctx.clone(), jobs, notifier);

    let bot = Arc::new(Bot::new(api, ctx, &config.telegram));
    info!("bot is running");
    bot.run().await;
    Ok(())
}
