//! The full tool-calling reasoning loop.
//!
//! Bounded iterative protocol: invoke the backend with the transcript and
//! the selected tool palette; execute requested tools and feed structured
//! results back; terminate on a plain-text answer or at the iteration
//! ceiling. Token counts from every call are summed and reported once to
//! the usage governor — partial and aborted loops still report.

use tracing::{debug, warn};

use homemind_core::message::{ChatMessage, ContentBlock};
use homemind_llm::{ChatRequest, TokenUsage};

use crate::context::AgentContext;
use crate::tools::{execute_tool, select_tools};

/// Tool-use loops can cycle indefinitely if the backend keeps requesting
/// tools without converging; this ceiling bounds the damage.
const MAX_ITERATIONS: usize = 10;
const LOOP_MAX_TOKENS: u32 = 4096;

/// Soft-failure reply at the iteration ceiling.
pub const FALLBACK_MESSAGE: &str = "I apologize, but I wasn't able to complete that request. \
     Please try rephrasing or breaking it into smaller steps.";

/// Substituted for an empty terminal response — an empty chat message is
/// confusing to the end user.
const EMPTY_ACK: &str = "Done.";

const SYSTEM_PROMPT: &str = "You are a helpful smart-home controller. You help users monitor \
and control their home through natural language commands.

## Your Capabilities
- Check the status of any entity (lights, locks, sensors, switches, climate, etc.)
- Turn devices on/off, lock/unlock doors, adjust climate settings
- Query history and provide summaries
- Trigger, create, list, and delete automations
- Learn and remember the user's nicknames for entities

## Guidelines
1. When the user refers to a device by a nickname (like \"kitchen light\" or \"front door\"), \
try to resolve it to the actual entity. If you successfully figure out which entity they mean, \
use the save_entity_alias tool to remember it for next time.
2. Be concise. After executing a command, confirm what you did briefly.
3. If you're unsure which entity the user means, ask for clarification. You can list available \
entities in a domain to help them.
4. For status checks, provide relevant information without overwhelming detail. For sensors, \
include the value and unit. For binary states, say on/off or locked/unlocked clearly.
5. When checking multiple entities (like \"check all locks\"), summarize the results clearly.
6. If a command fails, explain what went wrong and suggest alternatives.

## Entity Information
{entity_summary}

## Known Aliases
{alias_summary}";

/// Result of one completed (or soft-failed) loop turn.
#[derive(Debug)]
pub struct AgentOutcome {
    pub reply: String,
    /// Transcript including this turn, untrimmed; callers trim on store.
    pub history: Vec<ChatMessage>,
    pub usage: TokenUsage,
}

/// Build the system preamble with live entity and alias summaries.
async fn build_system_prompt(ctx: &AgentContext) -> String {
    let entity_summary = ctx.cache.read().await.entity_summary();
    let alias_summary = ctx.aliases.lock().await.summary();
    SYSTEM_PROMPT
        .replace("{entity_summary}", &entity_summary)
        .replace("{alias_summary}", &alias_summary)
}

/// Report accumulated usage to the governor, tolerating persistence errors.
pub(crate) async fn record_usage(ctx: &AgentContext, usage: TokenUsage) {
    if usage.total() == 0 {
        return;
    }
    let mut tracker = ctx.usage.lock().await;
    if let Err(e) = tracker.record_usage(usage.input_tokens, usage.output_tokens) {
        warn!("failed to persist usage record: {e}");
    }
}

/// Run the agent loop for one user message.
///
/// On a top-level backend error the current path aborts with `Err` after
/// reporting whatever usage was consumed; the transport layer renders the
/// catch-all reply.
pub async fn run_agent(
    ctx: &AgentContext,
    user_message: &str,
    history: Vec<ChatMessage>,
) -> homemind_core::Result<AgentOutcome> {
    let mut messages: Vec<ChatMessage> = history
        .into_iter()
        .filter(ChatMessage::is_substantive)
        .collect();
    messages.push(ChatMessage::user(user_message));

    let system = build_system_prompt(ctx).await;
    let tools = select_tools(user_message);
    let model = ctx.current_model().await;
    let mut total = TokenUsage::default();

    for iteration in 1..=MAX_ITERATIONS {
        debug!("agent iteration {iteration}");
        let request = ChatRequest {
            model: model.clone(),
            system: Some(system.clone()),
            messages: messages.clone(),
            tools: tools.clone(),
            max_tokens: LOOP_MAX_TOKENS,
        };

        let response = match ctx.llm.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                record_usage(ctx, total).await;
                return Err(e.into());
            }
        };
        total.add(response.usage);

        if response.wants_tools() {
            let assistant = ChatMessage::assistant_blocks(response.content.clone());
            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                let payload = execute_tool(ctx, name, input.clone()).await;
                let is_error = payload.get("error").is_some();
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: serde_json::to_string(&payload).unwrap_or_default(),
                    is_error,
                });
            }
            messages.push(assistant);
            messages.push(ChatMessage::tool_results(results));
            continue;
        }

        let mut reply = response.text().trim().to_string();
        if reply.is_empty() {
            reply = EMPTY_ACK.to_string();
        }
        messages.push(ChatMessage::assistant(&reply));
        record_usage(ctx, total).await;
        return Ok(AgentOutcome {
            reply,
            history: messages,
            usage: total,
        });
    }

    warn!("agent hit max iterations");
    messages.push(ChatMessage::assistant(FALLBACK_MESSAGE));
    record_usage(ctx, total).await;
    Ok(AgentOutcome {
        reply: FALLBACK_MESSAGE.to_string(),
        history: messages,
        usage: total,
    })
}

/// Run a canned prompt with no prior history (scheduler entry point).
pub async fn run_scheduled_prompt(ctx: &AgentContext, prompt: &str) -> homemind_core::Result<String> {
    let outcome = run_agent(ctx, prompt, Vec::new()).await?;
    Ok(outcome.reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::harness;
    use homemind_core::entity::Entity;
    use homemind_llm::StopReason;

    #[tokio::test]
    async fn test_text_response_terminates_immediately() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        h.llm.push_text("All quiet at home.", TokenUsage::new(100, 10));

        let outcome = run_agent(&h.ctx, "how are things", Vec::new()).await.unwrap();
        assert_eq!(outcome.reply, "All quiet at home.");
        assert_eq!(h.llm.call_count(), 1);
        assert_eq!(outcome.usage, TokenUsage::new(100, 10));
        // Transcript carries the user message and the reply.
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_results_back() {
        let h = harness(vec![Entity::new("lock.front_door", "Front Door")]).await;
        h.llm.push_tool_use(
            "get_entity_state",
            serde_json::json!({"entity_id": "lock.front_door"}),
            TokenUsage::new(50, 5),
        );
        h.llm.push_text("The front door is on.", TokenUsage::new(80, 8));

        let outcome = run_agent(&h.ctx, "check the front door", Vec::new())
            .await
            .unwrap();
        assert_eq!(outcome.reply, "The front door is on.");
        assert_eq!(outcome.usage, TokenUsage::new(130, 13));

        // The second request must contain the tool result block.
        let requests = h.llm.requests();
        assert_eq!(requests.len(), 2);
        let followup = &requests[1].messages;
        assert!(followup.iter().any(|m| m
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { .. }))));
    }

    #[tokio::test]
    async fn test_iteration_ceiling_with_summed_tokens() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        // A single scripted tool-use response repeats forever.
        h.llm.push_tool_use(
            "get_entity_state",
            serde_json::json!({"entity_id": "light.kitchen_main"}),
            TokenUsage::new(10, 2),
        );

        let outcome = run_agent(&h.ctx, "check the kitchen light", Vec::new())
            .await
            .unwrap();
        assert_eq!(outcome.reply, FALLBACK_MESSAGE);
        assert_eq!(h.llm.call_count(), 10);
        assert_eq!(outcome.usage, TokenUsage::new(100, 20));

        // The ceiling still reports usage to the governor.
        let tracker = h.ctx.usage.lock().await;
        assert_eq!(tracker.today_usage().total_tokens(), 120);
    }

    #[tokio::test]
    async fn test_empty_terminal_response_is_substituted() {
        let h = harness(vec![]).await;
        h.llm.push(homemind_llm::ChatResponse {
            content: vec![ContentBlock::Text {
                text: "   ".to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::new(5, 1),
        });

        let outcome = run_agent(&h.ctx, "toggle the fan", Vec::new()).await.unwrap();
        assert_eq!(outcome.reply, "Done.");
    }

    #[tokio::test]
    async fn test_backend_error_aborts_after_recording() {
        let h = harness(vec![]).await;
        // Failing backend: first call errors, nothing consumed.
        let failing = std::sync::Arc::new(homemind_llm::mock::MockBackend::failing());
        let ctx = crate::context::AgentContext::new(
            h.ctx.hass.clone(),
            failing,
            h.ctx.cache.clone(),
            h.ctx.aliases.clone(),
            h.ctx.usage.clone(),
            "claude-sonnet-4-5".to_string(),
            10,
        );

        assert!(run_agent(&ctx, "hello", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_history_entries_filtered_on_merge() {
        let h = harness(vec![]).await;
        h.llm.push_text("ok", TokenUsage::new(1, 1));

        let history = vec![ChatMessage::assistant(""), ChatMessage::user("earlier")];
        let outcome = run_agent(&h.ctx, "now", history).await.unwrap();
        // Empty assistant turn dropped: earlier + now + reply.
        assert_eq!(outcome.history.len(), 3);
    }

    #[tokio::test]
    async fn test_system_prompt_embeds_summaries() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        h.llm.push_text("done", TokenUsage::new(1, 1));
        run_agent(&h.ctx, "hello", Vec::new()).await.unwrap();

        let system = h.llm.requests()[0].system.clone().unwrap();
        assert!(system.contains("1 light"));
        assert!(system.contains("No entity aliases configured."));
    }
}
