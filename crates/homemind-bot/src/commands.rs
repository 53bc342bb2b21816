//! Administrative slash commands, mapped 1:1 onto governor and config
//! operations.

use homemind_agent::AgentContext;
use homemind_core::config::{MODEL_TIERS, friendly_model_name, resolve_model};

const GREETING: &str = "Hello! I'm your smart-home controller. You can ask me to:\n\n\
- Check device status: \"Are all doors locked?\"\n\
- Control devices: \"Turn off the kitchen lights\"\n\
- Get information: \"What's the temperature?\"\n\
- And more!\n\n\
Commands:\n\
/status - Bot status\n\
/usage - Today's token usage\n\
/limit <n> - Set the daily token limit\n\
/hardlimit on|off - Toggle hard budget enforcement\n\
/resetusage - Reset today's counters\n\
/model - View/change AI model\n\
/clear - Reset conversation";

/// Split a leading slash command into (command, args).
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    // Group-chat form "/status@my_bot".
    let command = command.split('@').next().unwrap_or(command);
    Some((command, args))
}

/// Execute an admin command and render its reply.
pub async fn handle_command(
    ctx: &AgentContext,
    chat_id: i64,
    command: &str,
    args: &str,
) -> String {
    match command {
        "start" => GREETING.to_string(),

        "clear" => {
            ctx.history.clear(chat_id);
            "Conversation history cleared.".to_string()
        }

        "status" => {
            let connected = if ctx.hass.check_connection().await {
                "Connected"
            } else {
                "Disconnected"
            };
            let model = ctx.current_model().await;
            let cache_summary = ctx.cache.read().await.entity_summary();
            let history_len = ctx.history.len(chat_id);
            format!(
                "Bot status:\n\
                 - Home Assistant: {connected}\n\
                 - Model: {}\n\
                 - {cache_summary}\n\
                 - Your conversation history: {history_len} messages",
                friendly_model_name(&model),
            )
        }

        "usage" => {
            let model = ctx.current_model().await;
            ctx.usage.lock().await.summary(&model)
        }

        "limit" => match args.parse::<u64>() {
            Ok(limit) => {
                let mut usage = ctx.usage.lock().await;
                match usage.set_daily_limit(limit) {
                    Ok(()) => format!("Daily token limit set to {limit}."),
                    Err(e) => format!("Could not save the limit: {e}"),
                }
            }
            Err(_) => "Usage: /limit <tokens>, e.g. /limit 100000".to_string(),
        },

        "hardlimit" => match args {
            "on" => set_hard_limit(ctx, true).await,
            "off" => set_hard_limit(ctx, false).await,
            _ => "Usage: /hardlimit on|off".to_string(),
        },

        "resetusage" => {
            let mut usage = ctx.usage.lock().await;
            match usage.reset_today() {
                Ok(()) => "Today's usage counters reset.".to_string(),
                Err(e) => format!("Could not reset counters: {e}"),
            }
        }

        "model" => {
            if args.is_empty() {
                let current = ctx.current_model().await;
                let options: Vec<String> = MODEL_TIERS
                    .iter()
                    .map(|(name, _, description)| format!("  - {name}: {description}"))
                    .collect();
                return format!(
                    "Current model: {}\n\nAvailable models:\n{}\n\n\
                     Usage: /model <name>\nExample: /model haiku",
                    friendly_model_name(&current),
                    options.join("\n"),
                );
            }
            match resolve_model(args) {
                Some(model_id) => {
                    *ctx.model.write().await = model_id.to_string();
                    format!("Model switched to {args}.")
                }
                None => format!("Unknown model '{args}'. Try haiku, sonnet, or opus."),
            }
        }

        other => format!("Unknown command: /{other}"),
    }
}

async fn set_hard_limit(ctx: &AgentContext, enabled: bool) -> String {
    let mut usage = ctx.usage.lock().await;
    match usage.set_hard_limit(enabled) {
        Ok(()) => format!(
            "Hard budget enforcement {}.",
            if enabled { "enabled" } else { "disabled" }
        ),
        Err(e) => format!("Could not update enforcement: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    use homemind_core::entity::Entity;
    use homemind_hass::HomeAssistant;
    use homemind_hass::mock::MockHass;
    use homemind_llm::LlmBackend;
    use homemind_llm::mock::MockBackend;
    use homemind_storage::{AliasStore, EntityCache, UsageTracker};

    async fn context(dir: &tempfile::TempDir) -> Arc<AgentContext> {
        let hass = Arc::new(MockHass::with_entities(vec![Entity::new(
            "light.kitchen_main",
            "Kitchen Light",
        )]));
        let mut cache = EntityCache::open(dir.path().join("cache.json"), 6);
        cache.refresh(hass.as_ref()).await.unwrap();

        Arc::new(AgentContext::new(
            hass as Arc<dyn HomeAssistant>,
            Arc::new(MockBackend::new()) as Arc<dyn LlmBackend>,
            Arc::new(RwLock::new(cache)),
            Arc::new(Mutex::new(AliasStore::open(dir.path().join("aliases.json")))),
            Arc::new(Mutex::new(UsageTracker::open(dir.path().join("usage.json")))),
            "claude-sonnet-4-5".to_string(),
            10,
        ))
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/status"), Some(("status", "")));
        assert_eq!(parse_command("/limit 50000"), Some(("limit", "50000")));
        assert_eq!(parse_command("/status@homemind_bot"), Some(("status", "")));
        assert_eq!(parse_command("turn on the light"), None);
    }

    #[tokio::test]
    async fn test_limit_command_updates_policy() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).await;

        let reply = handle_command(&ctx, 1, "limit", "50000").await;
        assert!(reply.contains("50000"));
        assert_eq!(ctx.usage.lock().await.policy().daily_token_limit, 50_000);

        let reply = handle_command(&ctx, 1, "limit", "lots").await;
        assert!(reply.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn test_hardlimit_command_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).await;

        handle_command(&ctx, 1, "hardlimit", "on").await;
        assert!(ctx.usage.lock().await.policy().hard_limit_enabled);
        handle_command(&ctx, 1, "hardlimit", "off").await;
        assert!(!ctx.usage.lock().await.policy().hard_limit_enabled);
    }

    #[tokio::test]
    async fn test_model_command_switches_model() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).await;

        let reply = handle_command(&ctx, 1, "model", "haiku").await;
        assert!(reply.contains("haiku"));
        assert_eq!(ctx.current_model().await, "claude-haiku-4-5");

        let reply = handle_command(&ctx, 1, "model", "gpt-9").await;
        assert!(reply.contains("Unknown model"));
    }

    #[tokio::test]
    async fn test_clear_command_forgets_history() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).await;
        ctx.history
            .set(1, vec![homemind_core::ChatMessage::user("hello")]);

        handle_command(&ctx, 1, "clear", "").await;
        assert_eq!(ctx.history.len(1), 0);
    }

    #[tokio::test]
    async fn test_status_command_reports_cache() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).await;

        let reply = handle_command(&ctx, 1, "status", "").await;
        assert!(reply.contains("Connected"));
        assert!(reply.contains("1 light"));
        assert!(reply.contains("sonnet"));
    }
}
