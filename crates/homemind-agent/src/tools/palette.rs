//! Tool definitions, organized into capability groups.

use serde_json::json;

use homemind_llm::ToolSpec;

/// Capability groups the selector can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolGroup {
    /// State lookup and alias saving. Always active.
    Core,
    /// Domain listings and areas. Default when nothing else matches.
    Query,
    /// On/off/toggle and raw service calls.
    Control,
    Lock,
    Climate,
    History,
    Automation,
}

impl ToolGroup {
    /// Every group, in palette order.
    pub const ALL: [ToolGroup; 7] = [
        ToolGroup::Core,
        ToolGroup::Query,
        ToolGroup::Control,
        ToolGroup::Lock,
        ToolGroup::Climate,
        ToolGroup::History,
        ToolGroup::Automation,
    ];
}

fn entity_ref_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "entity_id": {
                "type": "string",
                "description": description
            }
        },
        "required": ["entity_id"]
    })
}

fn spec(name: &str, description: &str, input_schema: serde_json::Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn group_tools(group: ToolGroup) -> Vec<ToolSpec> {
    match group {
        ToolGroup::Core => vec![
            spec(
                "get_entity_state",
                "Get the current state of an entity. Use this to check if lights are on/off, \
                 doors locked/unlocked, sensor values, etc.",
                entity_ref_schema(
                    "The entity ID (e.g. 'light.living_room') or a natural language name \
                     that will be resolved to an entity",
                ),
            ),
            spec(
                "save_entity_alias",
                "Remember a user's nickname for an entity so it is recognized next time. \
                 Call this when you successfully resolve a natural language reference.",
                json!({
                    "type": "object",
                    "properties": {
                        "alias": {"type": "string", "description": "The user's nickname (e.g. 'foyer light')"},
                        "entity_id": {"type": "string", "description": "The actual entity_id"}
                    },
                    "required": ["alias", "entity_id"]
                }),
            ),
            spec(
                "get_known_aliases",
                "List all learned entity aliases/nicknames.",
                json!({"type": "object", "properties": {}}),
            ),
        ],
        ToolGroup::Query => vec![
            spec(
                "get_entities_by_domain",
                "List entities in a domain (max 25 results). Use for small domains like lock \
                 or climate; for large domains prefer get_entity_state with a specific name.",
                json!({
                    "type": "object",
                    "properties": {
                        "domain": {"type": "string", "description": "The domain to list (e.g. 'lock'). Avoid 'sensor' - too many results."}
                    },
                    "required": ["domain"]
                }),
            ),
            spec(
                "list_areas",
                "List all areas/rooms defined in the smart-home platform.",
                json!({"type": "object", "properties": {}}),
            ),
        ],
        ToolGroup::Control => vec![
            spec(
                "turn_on",
                "Turn on a light, switch, or other entity that supports being turned on.",
                json!({
                    "type": "object",
                    "properties": {
                        "entity_id": {"type": "string", "description": "The entity ID or natural language name"},
                        "brightness": {"type": "integer", "description": "Optional brightness level 0-255 for lights"},
                        "color_temp": {"type": "integer", "description": "Optional color temperature in mireds"}
                    },
                    "required": ["entity_id"]
                }),
            ),
            spec(
                "turn_off",
                "Turn off a light, switch, or other entity.",
                entity_ref_schema("The entity ID or natural language name"),
            ),
            spec(
                "toggle",
                "Toggle an entity (if on, turn off; if off, turn on).",
                entity_ref_schema("The entity ID or natural language name"),
            ),
            spec(
                "call_service",
                "Call any platform service directly. Use for advanced operations not covered \
                 by other tools.",
                json!({
                    "type": "object",
                    "properties": {
                        "domain": {"type": "string", "description": "Service domain (e.g. 'light', 'scene')"},
                        "service": {"type": "string", "description": "Service name (e.g. 'turn_on')"},
                        "entity_id": {"type": "string", "description": "Optional entity ID or name"},
                        "data": {"type": "object", "description": "Optional service data"}
                    },
                    "required": ["domain", "service"]
                }),
            ),
        ],
        ToolGroup::Lock => vec![
            spec(
                "lock_door",
                "Lock a door lock.",
                entity_ref_schema("The lock entity ID or natural language name (e.g. 'front door')"),
            ),
            spec(
                "unlock_door",
                "Unlock a door lock.",
                entity_ref_schema("The lock entity ID or natural language name"),
            ),
        ],
        ToolGroup::Climate => vec![spec(
            "set_climate",
            "Set thermostat/climate settings.",
            json!({
                "type": "object",
                "properties": {
                    "entity_id": {"type": "string", "description": "The climate entity ID or natural language name"},
                    "temperature": {"type": "number", "description": "Target temperature"},
                    "hvac_mode": {"type": "string", "description": "HVAC mode: heat, cool, auto, off, ..."}
                },
                "required": ["entity_id"]
            }),
        )],
        ToolGroup::History => vec![spec(
            "get_history",
            "Get state history for an entity over the past N hours.",
            json!({
                "type": "object",
                "properties": {
                    "entity_id": {"type": "string", "description": "The entity ID or natural language name"},
                    "hours": {"type": "integer", "description": "Hours of history to retrieve (default: 24)"}
                },
                "required": ["entity_id"]
            }),
        )],
        ToolGroup::Automation => vec![
            spec(
                "trigger_automation",
                "Trigger an existing automation.",
                entity_ref_schema("The automation entity ID or name"),
            ),
            spec(
                "create_automation",
                "Create a new automation (best effort; the platform validates the definition).",
                json!({
                    "type": "object",
                    "properties": {
                        "alias": {"type": "string", "description": "Human-readable automation name"},
                        "description": {"type": "string"},
                        "trigger": {"description": "Trigger definition (platform schema)"},
                        "condition": {"description": "Optional condition definition"},
                        "action": {"description": "Action definition (platform schema)"},
                        "mode": {"type": "string", "description": "Run mode, default 'single'"}
                    },
                    "required": ["alias", "trigger", "action"]
                }),
            ),
            spec(
                "list_automations",
                "List all automations with their current state.",
                json!({"type": "object", "properties": {}}),
            ),
            spec(
                "delete_automation",
                "Delete an automation by its config id.",
                json!({
                    "type": "object",
                    "properties": {
                        "config_id": {"type": "string", "description": "The automation config id"}
                    },
                    "required": ["config_id"]
                }),
            ),
        ],
    }
}

/// Tools for the given groups, in stable palette order and without
/// duplicates.
pub fn palette_for(groups: &[ToolGroup]) -> Vec<ToolSpec> {
    ToolGroup::ALL
        .iter()
        .filter(|group| groups.contains(group))
        .flat_map(|group| group_tools(*group))
        .collect()
}

/// The complete palette.
pub fn full_palette() -> Vec<ToolSpec> {
    palette_for(&ToolGroup::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_palette_has_unique_names() {
        let palette = full_palette();
        let mut names: Vec<&str> = palette.iter().map(|t| t.name.as_str()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 17);
    }

    #[test]
    fn test_palette_order_is_stable() {
        // Core tools lead regardless of the group order passed in.
        let palette = palette_for(&[ToolGroup::Lock, ToolGroup::Core]);
        assert_eq!(palette[0].name, "get_entity_state");
        assert!(palette.iter().any(|t| t.name == "lock_door"));
    }
}
