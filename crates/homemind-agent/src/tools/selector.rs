//! Keyword-driven tool selection.
//!
//! A static (group → keywords) table maps message text to the capability
//! groups offered to the backend. Keeping the table as data keeps it
//! independently testable and tunable without touching control flow.

use homemind_llm::ToolSpec;

use super::palette::{ToolGroup, palette_for};

/// Keywords that activate each capability group. Short keywords (≤ 3 chars)
/// match on word boundaries to avoid substring false positives ("on" inside
/// "upon"); longer keywords match as substrings.
const GROUP_KEYWORDS: &[(ToolGroup, &[&str])] = &[
    (
        ToolGroup::Control,
        &[
            "turn", "on", "off", "toggle", "switch", "dim", "brighten", "brightness", "light",
            "lights", "fan", "start", "stop",
        ],
    ),
    (
        ToolGroup::Lock,
        &["lock", "unlock", "locked", "unlocked", "door", "doors", "secure"],
    ),
    (
        ToolGroup::Climate,
        &[
            "temp", "temperature", "thermostat", "heat", "cool", "climate", "degrees", "warm",
            "cold",
        ],
    ),
    (
        ToolGroup::History,
        &["history", "when did", "last time", "yesterday", "earlier", "past", "recently"],
    ),
    (
        ToolGroup::Automation,
        &[
            "automation", "automations", "automate", "schedule", "scene", "script", "routine",
            "whenever", "trigger",
        ],
    ),
    (
        ToolGroup::Query,
        &[
            "status", "state", "check", "list", "how many", "which", "are all", "why", "what",
            "where", "how",
        ],
    ),
];

fn keyword_hit(message: &str, keyword: &str) -> bool {
    if keyword.len() <= 3 {
        message
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    } else {
        message.contains(keyword)
    }
}

/// The capability groups a message activates.
///
/// Core is always present. First keyword hit wins per group; groups are
/// independent and additive. A message with no actionable keyword gets the
/// query group — an undetected message is more likely a status question
/// than a no-op.
pub fn select_groups(message: &str) -> Vec<ToolGroup> {
    let lower = message.to_lowercase();
    let mut groups = vec![ToolGroup::Core];

    for (group, keywords) in GROUP_KEYWORDS {
        if keywords.iter().any(|keyword| keyword_hit(&lower, keyword)) {
            groups.push(*group);
        }
    }

    if groups.len() == 1 {
        groups.push(ToolGroup::Query);
    }
    groups
}

/// The tool subset offered to the backend for a message.
pub fn select_tools(message: &str) -> Vec<ToolSpec> {
    palette_for(&select_groups(message))
}
