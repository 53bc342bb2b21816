//! Per-message orchestration.
//!
//! Budget gate → fast classification → direct execution, falling back to
//! the full agent loop. The end user always receives some text — never a
//! bare error.

use tracing::{info, warn};

use crate::agent::{record_usage, run_agent};
use crate::context::AgentContext;
use crate::executor::execute_direct;
use crate::intent::{IntentOutcome, extract_intent};

/// Reply for one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    /// Budget warning to surface alongside the reply.
    pub warning: Option<String>,
}

impl TurnReply {
    fn new(text: impl Into<String>, warning: Option<String>) -> Self {
        Self {
            text: text.into(),
            warning,
        }
    }
}

/// Handle one user message end-to-end.
pub async fn handle_message(ctx: &AgentContext, chat_id: i64, message: &str) -> TurnReply {
    // Gate before any backend call.
    let budget = ctx.usage.lock().await.check_budget();
    let warning = budget.warning().map(str::to_string);
    if let homemind_storage::BudgetStatus::Blocked { message } = budget {
        info!("request blocked by budget");
        return TurnReply::new(message, None);
    }

    refresh_cache_if_needed(ctx).await;

    match extract_intent(ctx, message).await {
        IntentOutcome::Simple(intent) => {
            record_usage(ctx, intent.usage).await;
            if let Some(reply) = execute_direct(ctx, &intent).await {
                return TurnReply::new(reply, warning);
            }
            // The entity could not be confirmed; fall through to the loop.
        }
        IntentOutcome::NeedsFullAgent { usage } => {
            record_usage(ctx, usage).await;
        }
    }

    let history = ctx.history.get(chat_id);
    match run_agent(ctx, message, history).await {
        Ok(outcome) => {
            ctx.history.set(chat_id, outcome.history);
            TurnReply::new(outcome.reply, warning)
        }
        Err(e) => {
            warn!("agent turn failed: {e}");
            TurnReply::new(format!("Sorry, I encountered an error: {e}"), warning)
        }
    }
}

/// Refresh the entity cache when stale. Refresh is serialized through the
/// write guard; a failure leaves the previous snapshot usable.
async fn refresh_cache_if_needed(ctx: &AgentContext) {
    if !ctx.cache.read().await.needs_refresh() {
        return;
    }
    let mut cache = ctx.cache.write().await;
    if !cache.needs_refresh() {
        return;
    }
    if let Err(e) = cache.refresh(ctx.hass.as_ref()).await {
        warn!("entity cache refresh failed, continuing with stale data: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::harness;
    use homemind_core::entity::Entity;
    use homemind_llm::TokenUsage;

    #[tokio::test]
    async fn test_simple_command_stays_on_fast_path() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        h.ctx
            .aliases
            .lock()
            .await
            .learn("kitchen light", "light.kitchen_main")
            .unwrap();
        h.llm.push_text(
            r#"{"intent": "turn_on", "entity_id": "light.kitchen_main", "confidence": "high"}"#,
            TokenUsage::new(40, 12),
        );

        let reply = handle_message(&h.ctx, 1, "turn on the kitchen light").await;

        // Affirmative confirmation referencing the kitchen light.
        assert!(reply.text.contains("Kitchen Light"));
        // One extraction call, zero full-loop calls.
        assert_eq!(h.llm.call_count(), 1);
        assert!(h.llm.requests()[0].tools.is_empty());
        // Exactly one turn-on service call.
        let calls = h.hass.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service, "turn_on");
        assert_eq!(calls[0].entity_id.as_deref(), Some("light.kitchen_main"));
        // Extraction tokens recorded.
        assert_eq!(h.ctx.usage.lock().await.today_usage().total_tokens(), 52);
    }

    #[tokio::test]
    async fn test_reasoning_question_routes_to_full_loop() {
        let h = harness(vec![Entity::new("climate.thermostat", "Thermostat")]).await;
        h.llm
            .push_text("The heat has been off since noon.", TokenUsage::new(200, 30));

        let reply = handle_message(&h.ctx, 1, "why is the living room so cold").await;
        assert_eq!(reply.text, "The heat has been off since noon.");

        // The keyword gate skipped extraction: the only call is the loop
        // call, and it carries the climate + query tool groups.
        assert_eq!(h.llm.call_count(), 1);
        let tools: Vec<String> = h.llm.requests()[0]
            .tools
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert!(tools.contains(&"set_climate".to_string()));
        assert!(tools.contains(&"get_entities_by_domain".to_string()));
        assert!(tools.contains(&"get_entity_state".to_string()));
    }

    #[tokio::test]
    async fn test_blocked_budget_skips_all_backend_calls() {
        let h = harness(vec![]).await;
        {
            let mut usage = h.ctx.usage.lock().await;
            usage.set_daily_limit(100).unwrap();
            usage.set_hard_limit(true).unwrap();
            usage.record_usage(100, 0).unwrap();
        }

        let reply = handle_message(&h.ctx, 1, "turn on the kitchen light").await;
        assert!(reply.text.contains("Try again tomorrow"));
        assert_eq!(h.llm.call_count(), 0);
        assert!(h.hass.calls().is_empty());
    }

    #[tokio::test]
    async fn test_warning_is_attached_to_reply() {
        let h = harness(vec![]).await;
        h.ctx.usage.lock().await.record_usage(85_000, 0).unwrap();
        h.llm.push_text("ok", TokenUsage::new(1, 1));

        let reply = handle_message(&h.ctx, 1, "hello").await;
        assert!(reply.warning.is_some_and(|w| w.contains("budget")));
    }

    #[tokio::test]
    async fn test_failed_extraction_falls_back_to_loop() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        // Extraction returns prose; the loop then answers.
        h.llm.push_text("no json here", TokenUsage::new(30, 10));
        h.llm.push_text("Turned it on for you.", TokenUsage::new(100, 10));

        let reply = handle_message(&h.ctx, 1, "turn on the kitchen light").await;
        assert_eq!(reply.text, "Turned it on for you.");
        assert_eq!(h.llm.call_count(), 2);
        // Both the wasted extraction and the loop usage are recorded.
        assert_eq!(h.ctx.usage.lock().await.today_usage().total_tokens(), 150);
    }

    #[tokio::test]
    async fn test_full_loop_updates_history() {
        let h = harness(vec![]).await;
        h.llm.push_text("Hi!", TokenUsage::new(5, 1));

        handle_message(&h.ctx, 7, "hello status check").await;
        assert_eq!(h.ctx.history.len(7), 2);
        // Other participants are untouched.
        assert_eq!(h.ctx.history.len(8), 0);
    }

    #[tokio::test]
    async fn test_backend_error_yields_catch_all_text() {
        let h = harness(vec![]).await;
        // No scripted responses: the mock errors on the loop call.
        let reply = handle_message(&h.ctx, 1, "what's the status of everything").await;
        assert!(reply.text.starts_with("Sorry, I encountered an error"));
    }
}
