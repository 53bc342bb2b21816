//! Typed tool execution.
//!
//! Tool arguments arrive as untrusted JSON from the backend and are parsed
//! into typed requests at this boundary. Execution errors are isolated into
//! the result payload — one failing tool never aborts the rest of the batch
//! or the loop.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use homemind_core::entity::coerce_domain;
use homemind_hass::AutomationSpec;

use crate::context::AgentContext;

/// Listing cap for domain queries, to avoid token bloat in the transcript.
const DOMAIN_LISTING_CAP: usize = 25;
/// Recent state changes included in a history summary.
const HISTORY_TAIL: usize = 10;

#[derive(Debug, Deserialize)]
struct EntityArgs {
    entity_id: String,
}

#[derive(Debug, Deserialize)]
struct DomainArgs {
    domain: String,
}

#[derive(Debug, Deserialize)]
struct TurnOnArgs {
    entity_id: String,
    brightness: Option<u64>,
    color_temp: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClimateArgs {
    entity_id: String,
    temperature: Option<f64>,
    hvac_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    entity_id: String,
    #[serde(default = "default_history_hours")]
    hours: u32,
}

fn default_history_hours() -> u32 {
    24
}

#[derive(Debug, Deserialize)]
struct ServiceArgs {
    domain: String,
    service: String,
    entity_id: Option<String>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AliasArgs {
    alias: String,
    entity_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateAutomationArgs {
    alias: String,
    description: Option<String>,
    trigger: Value,
    condition: Option<Value>,
    action: Value,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteAutomationArgs {
    config_id: String,
}

/// A tool invocation parsed into its typed form.
#[derive(Debug)]
enum ToolRequest {
    GetEntityState(EntityArgs),
    GetEntitiesByDomain(DomainArgs),
    TurnOn(TurnOnArgs),
    TurnOff(EntityArgs),
    Toggle(EntityArgs),
    LockDoor(EntityArgs),
    UnlockDoor(EntityArgs),
    SetClimate(ClimateArgs),
    GetHistory(HistoryArgs),
    ListAreas,
    CallService(ServiceArgs),
    TriggerAutomation(EntityArgs),
    CreateAutomation(CreateAutomationArgs),
    ListAutomations,
    DeleteAutomation(DeleteAutomationArgs),
    SaveEntityAlias(AliasArgs),
    GetKnownAliases,
}

impl ToolRequest {
    fn parse(name: &str, input: Value) -> Result<Self, String> {
        fn args<T: serde::de::DeserializeOwned>(input: Value) -> Result<T, String> {
            serde_json::from_value(input).map_err(|e| format!("invalid arguments: {e}"))
        }

        Ok(match name {
            "get_entity_state" => ToolRequest::GetEntityState(args(input)?),
            "get_entities_by_domain" => ToolRequest::GetEntitiesByDomain(args(input)?),
            "turn_on" => ToolRequest::TurnOn(args(input)?),
            "turn_off" => ToolRequest::TurnOff(args(input)?),
            "toggle" => ToolRequest::Toggle(args(input)?),
            "lock_door" => ToolRequest::LockDoor(args(input)?),
            "unlock_door" => ToolRequest::UnlockDoor(args(input)?),
            "set_climate" => ToolRequest::SetClimate(args(input)?),
            "get_history" => ToolRequest::GetHistory(args(input)?),
            "list_areas" => ToolRequest::ListAreas,
            "call_service" => ToolRequest::CallService(args(input)?),
            "trigger_automation" => ToolRequest::TriggerAutomation(args(input)?),
            "create_automation" => ToolRequest::CreateAutomation(args(input)?),
            "list_automations" => ToolRequest::ListAutomations,
            "delete_automation" => ToolRequest::DeleteAutomation(args(input)?),
            "save_entity_alias" => ToolRequest::SaveEntityAlias(args(input)?),
            "get_known_aliases" => ToolRequest::GetKnownAliases,
            other => return Err(format!("unknown tool: {other}")),
        })
    }
}

/// Execute a tool requested by the backend.
///
/// Always returns a JSON payload; failures come back as `{"error": ...}` so
/// the backend can decide how to inform the user or retry differently.
pub async fn execute_tool(ctx: &AgentContext, name: &str, input: Value) -> Value {
    let request = match ToolRequest::parse(name, input) {
        Ok(request) => request,
        Err(message) => return json!({ "error": message }),
    };

    info!("executing tool: {name}");
    match run(ctx, request).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!("tool execution error ({name}): {e}");
            json!({ "error": e.to_string() })
        }
    }
}

async fn run(ctx: &AgentContext, request: ToolRequest) -> homemind_hass::Result<Value> {
    match request {
        ToolRequest::GetEntityState(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            let state = ctx.hass.get_state(&entity_id).await?;
            Ok(json!({
                "entity_id": state.entity_id,
                "state": state.state,
                "friendly_name": state.friendly_name(),
                "attributes": state.attributes,
            }))
        }

        ToolRequest::GetEntitiesByDomain(args) => {
            let states = ctx.hass.get_states(Some(&args.domain)).await?;
            let total_count = states.len();
            let entities: Vec<Value> = states
                .iter()
                .take(DOMAIN_LISTING_CAP)
                .map(|s| {
                    json!({
                        "entity_id": s.entity_id,
                        "state": s.state,
                        "friendly_name": s.friendly_name(),
                    })
                })
                .collect();
            let mut payload = json!({
                "domain": args.domain,
                "total_count": total_count,
                "showing": entities.len(),
                "entities": entities,
            });
            if total_count > DOMAIN_LISTING_CAP {
                payload["note"] = json!(format!(
                    "Showing first {DOMAIN_LISTING_CAP} of {total_count}. \
                     Use get_entity_state with a specific name for others."
                ));
            }
            Ok(payload)
        }

        ToolRequest::TurnOn(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            let mut data = serde_json::Map::new();
            if let Some(brightness) = args.brightness {
                data.insert("brightness".to_string(), brightness.into());
            }
            if let Some(color_temp) = args.color_temp {
                data.insert("color_temp".to_string(), color_temp.into());
            }
            let data = (!data.is_empty()).then_some(Value::Object(data));
            ctx.hass.turn_on(&entity_id, data).await?;
            Ok(json!({"success": true, "action": "turned on", "entity_id": entity_id}))
        }

        ToolRequest::TurnOff(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            ctx.hass.turn_off(&entity_id).await?;
            Ok(json!({"success": true, "action": "turned off", "entity_id": entity_id}))
        }

        ToolRequest::Toggle(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            ctx.hass.toggle(&entity_id).await?;
            Ok(json!({"success": true, "action": "toggled", "entity_id": entity_id}))
        }

        ToolRequest::LockDoor(args) => {
            let entity_id = coerce_domain(&ctx.resolve_entity(&args.entity_id).await, "lock");
            ctx.hass.lock(&entity_id).await?;
            Ok(json!({"success": true, "action": "locked", "entity_id": entity_id}))
        }

        ToolRequest::UnlockDoor(args) => {
            let entity_id = coerce_domain(&ctx.resolve_entity(&args.entity_id).await, "lock");
            ctx.hass.unlock(&entity_id).await?;
            Ok(json!({"success": true, "action": "unlocked", "entity_id": entity_id}))
        }

        ToolRequest::SetClimate(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            ctx.hass
                .set_climate(&entity_id, args.temperature, args.hvac_mode.as_deref())
                .await?;
            Ok(json!({"success": true, "action": "climate set", "entity_id": entity_id}))
        }

        ToolRequest::GetHistory(args) => {
            let entity_id = ctx.resolve_entity(&args.entity_id).await;
            let history = ctx.hass.get_history(&entity_id, args.hours).await?;
            let Some(states) = history.first().filter(|s| !s.is_empty()) else {
                return Ok(json!({
                    "entity_id": entity_id,
                    "hours": args.hours,
                    "state_changes": 0,
                }));
            };
            let recent: Vec<Value> = states
                .iter()
                .rev()
                .take(HISTORY_TAIL)
                .rev()
                .map(|entry| json!({"state": entry.state, "last_changed": entry.last_changed}))
                .collect();
            Ok(json!({
                "entity_id": entity_id,
                "hours": args.hours,
                "state_changes": states.len(),
                "recent_states": recent,
            }))
        }

        ToolRequest::ListAreas => {
            let cache = ctx.cache.read().await;
            let areas = cache.areas();
            if areas.is_empty() {
                return Ok(json!({
                    "areas": [],
                    "note": "Area data not available via the REST API",
                }));
            }
            Ok(json!({ "areas": areas }))
        }

        ToolRequest::CallService(args) => {
            let entity_id = match args.entity_id {
                Some(reference) => Some(ctx.resolve_entity(&reference).await),
                None => None,
            };
            ctx.hass
                .call_service(&args.domain, &args.service, entity_id.as_deref(), args.data)
                .await?;
            Ok(json!({"success": true, "domain": args.domain, "service": args.service}))
        }

        ToolRequest::TriggerAutomation(args) => {
            let entity_id = coerce_domain(&ctx.resolve_entity(&args.entity_id).await, "automation");
            ctx.hass.trigger_automation(&entity_id).await?;
            Ok(json!({"success": true, "action": "triggered", "entity_id": entity_id}))
        }

        ToolRequest::CreateAutomation(args) => {
            let spec = AutomationSpec {
                alias: args.alias,
                description: args.description,
                trigger: args.trigger,
                condition: args.condition.unwrap_or_else(|| json!([])),
                action: args.action,
                mode: args.mode.unwrap_or_else(|| "single".to_string()),
            };
            let config_id = ctx.hass.create_automation(spec).await?;
            Ok(json!({"success": true, "config_id": config_id}))
        }

        ToolRequest::ListAutomations => {
            let automations = ctx.hass.list_automations().await?;
            let entries: Vec<Value> = automations
                .iter()
                .map(|s| {
                    json!({
                        "entity_id": s.entity_id,
                        "state": s.state,
                        "friendly_name": s.friendly_name(),
                    })
                })
                .collect();
            Ok(json!({"automations": entries, "count": entries.len()}))
        }

        ToolRequest::DeleteAutomation(args) => {
            ctx.hass.delete_automation(&args.config_id).await?;
            Ok(json!({"success": true, "deleted": args.config_id}))
        }

        ToolRequest::SaveEntityAlias(args) => {
            let mut aliases = ctx.aliases.lock().await;
            let message = match aliases.learn(&args.alias, &args.entity_id) {
                Ok(true) => format!("I'll remember that '{}' refers to {}", args.alias, args.entity_id),
                Ok(false) => "Alias already known".to_string(),
                Err(e) => {
                    warn!("failed to persist alias: {e}");
                    "Alias could not be saved".to_string()
                }
            };
            Ok(json!({
                "success": true,
                "alias": args.alias,
                "entity_id": args.entity_id,
                "message": message,
            }))
        }

        ToolRequest::GetKnownAliases => {
            let aliases = ctx.aliases.lock().await;
            Ok(json!({"aliases": aliases.all(), "count": aliases.len()}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::harness;
    use homemind_core::entity::Entity;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_payload() {
        let h = harness(vec![]).await;
        let result = execute_tool(&h.ctx, "order_pizza", json!({})).await;
        assert!(result["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_an_error_payload() {
        let h = harness(vec![]).await;
        let result = execute_tool(&h.ctx, "turn_on", json!({"brightness": 40})).await;
        assert!(result["error"].as_str().unwrap().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_downstream_failure_is_isolated() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        h.hass.fail_calls.store(true, Ordering::Relaxed);
        let result = execute_tool(
            &h.ctx,
            "turn_off",
            json!({"entity_id": "light.kitchen_main"}),
        )
        .await;
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn test_natural_language_reference_is_resolved() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        let result = execute_tool(&h.ctx, "turn_on", json!({"entity_id": "kitchen light"})).await;
        assert_eq!(result["entity_id"], "light.kitchen_main");
        assert_eq!(h.hass.calls()[0].domain, "light");
    }

    #[tokio::test]
    async fn test_lock_tool_coerces_namespace() {
        let h = harness(vec![Entity::new("lock.front_door", "Front Door")]).await;
        let result = execute_tool(&h.ctx, "lock_door", json!({"entity_id": "front door"})).await;
        assert_eq!(result["entity_id"], "lock.front_door");
    }

    #[tokio::test]
    async fn test_save_and_list_aliases_round_trip() {
        let h = harness(vec![Entity::new("light.kitchen_main", "Kitchen Light")]).await;
        let saved = execute_tool(
            &h.ctx,
            "save_entity_alias",
            json!({"alias": "the big light", "entity_id": "light.kitchen_main"}),
        )
        .await;
        assert_eq!(saved["success"], true);

        let listed = execute_tool(&h.ctx, "get_known_aliases", json!({})).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["aliases"]["the big light"], "light.kitchen_main");
    }

    #[tokio::test]
    async fn test_domain_listing_is_capped() {
        let entities: Vec<Entity> = (0..30)
            .map(|i| Entity::new(format!("sensor.probe_{i}"), format!("Probe {i}")))
            .collect();
        let h = harness(entities).await;
        let result = execute_tool(&h.ctx, "get_entities_by_domain", json!({"domain": "sensor"})).await;
        assert_eq!(result["total_count"], 30);
        assert_eq!(result["showing"], 25);
        assert!(result["note"].as_str().unwrap().contains("first 25"));
    }

    #[tokio::test]
    async fn test_history_summary_keeps_recent_tail() {
        let h = harness(vec![Entity::new("lock.front_door", "Front Door")]).await;
        let entries: Vec<homemind_hass::HistoryEntry> = (0..15)
            .map(|i| homemind_hass::HistoryEntry {
                state: format!("state_{i}"),
                last_changed: None,
            })
            .collect();
        h.hass.set_history("lock.front_door", entries);

        let result = execute_tool(
            &h.ctx,
            "get_history",
            json!({"entity_id": "lock.front_door", "hours": 12}),
        )
        .await;
        assert_eq!(result["state_changes"], 15);
        let recent = result["recent_states"].as_array().unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0]["state"], "state_5");
        assert_eq!(recent[9]["state"], "state_14");
    }
}
