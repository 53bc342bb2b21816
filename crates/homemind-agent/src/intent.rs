//! Cost-bounded intent extraction for simple commands.
//!
//! A message is either classified into a single-entity, single-action
//! [`ExtractedIntent`] with one small structured-extraction call, or routed
//! to the full agent loop. The fast path must never block command execution:
//! every ambiguity, parse failure, or backend error degrades to
//! [`IntentOutcome::NeedsFullAgent`].

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use homemind_core::entity::PRIORITY_DOMAINS;
use homemind_llm::{ChatRequest, TokenUsage};

use crate::context::AgentContext;

/// Output cap for the extraction call; the payload is a single flat object.
const EXTRACTION_MAX_TOKENS: u32 = 300;

/// Per-domain entry cap for priority domains in the entity directory.
const PRIORITY_DOMAIN_CAP: usize = 15;
/// Entry cap for each non-priority domain.
const OTHER_DOMAIN_CAP: usize = 5;
/// At most this many non-priority domains are listed.
const OTHER_DOMAIN_LIMIT: usize = 5;

/// Phrases that signal multi-step reasoning, historical queries,
/// comparisons, or automation authoring. Any hit routes straight to the
/// full agent at zero cost.
const COMPLEX_KEYWORDS: &[&str] = &[
    "why",
    "how come",
    "what if",
    "explain",
    "history",
    "when did",
    "last time",
    "all the",
    "every",
    "check all",
    "compare",
    "difference",
    "help",
    "what can you",
    "schedule",
    "automate",
    "whenever",
    "routine",
    "scene",
    "script",
];

/// The simple, directly executable intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    TurnOn,
    TurnOff,
    Toggle,
    Lock,
    Unlock,
    GetState,
    SetClimate,
    SetBrightness,
    Unknown,
}

impl IntentKind {
    /// Parse from the extraction payload, defaulting to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(raw.to_string()))
            .unwrap_or(IntentKind::Unknown)
    }

    /// Human verb used in confirmation and failure messages.
    pub fn verb(&self) -> &'static str {
        match self {
            IntentKind::TurnOn => "turn on",
            IntentKind::TurnOff => "turn off",
            IntentKind::Toggle => "toggle",
            IntentKind::Lock => "lock",
            IntentKind::Unlock => "unlock",
            IntentKind::GetState => "check",
            IntentKind::SetClimate => "adjust the climate for",
            IntentKind::SetBrightness => "set the brightness of",
            IntentKind::Unknown => "handle",
        }
    }

    /// Whether direct execution is impossible without a resolved entity.
    /// Climate commands fall back to the home's (typically singular)
    /// thermostat instead.
    pub fn requires_entity(&self) -> bool {
        !matches!(self, IntentKind::SetClimate | IntentKind::Unknown)
    }
}

/// Extraction confidence as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Structured result of fast classification. Ephemeral — never persisted.
#[derive(Debug, Clone)]
pub struct ExtractedIntent {
    pub intent: IntentKind,
    /// Validated against the cache; a hallucinated id never survives here.
    pub entity_id: Option<String>,
    pub confidence: Confidence,
    /// Free-form secondary parameter (target temperature, brightness, ...).
    pub value: Option<String>,
    /// Nickname the backend suggests remembering for the resolved entity.
    pub alias_to_save: Option<String>,
    /// Pre-rendered confirmation phrase, used verbatim on success.
    pub response: Option<String>,
    /// Tokens spent producing the extraction.
    pub usage: TokenUsage,
}

/// Terminal state of the extraction state machine.
#[derive(Debug)]
pub enum IntentOutcome {
    Simple(ExtractedIntent),
    /// Escalate to the full loop. Carries whatever the failed extraction
    /// consumed (zero when the keyword gate short-circuited).
    NeedsFullAgent { usage: TokenUsage },
}

fn leading_when_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^when\s+\w+\s+\w+").unwrap())
}

fn multi_device_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(light|lock|switch|fan)s?\b").unwrap())
}

/// Keyword gate: true when the message is known in advance to require
/// multi-turn tool use. Pure and zero-cost.
pub fn needs_full_agent(message: &str) -> bool {
    let lower = message.to_lowercase();

    for keyword in COMPLEX_KEYWORDS {
        if lower.contains(keyword) {
            debug!("complex keyword detected: '{keyword}'");
            return true;
        }
    }

    // Automation authoring phrased as a leading "when <subject> <verb>".
    if leading_when_pattern().is_match(&lower) {
        return true;
    }

    // Multiple devices in one command ("kitchen and living room lights").
    if lower.contains(" and ") && multi_device_pattern().is_match(&lower) {
        return true;
    }

    false
}

/// Build the condensed entity directory for the extraction prompt.
///
/// Learned aliases come first as preferred matches; priority domains are
/// capped at 15 entries each, remaining domains at 5 entries across at most
/// 5 domains, to bound prompt size. Lock entities are annotated with their
/// live state so stale duplicates (unknown state) rank below working ones.
async fn build_entity_directory(ctx: &AgentContext) -> String {
    let mut sections: Vec<String> = Vec::new();

    {
        let aliases = ctx.aliases.lock().await;
        if !aliases.is_empty() {
            let lines: Vec<String> = aliases
                .all()
                .iter()
                .map(|(alias, id)| format!("  '{alias}' -> {id}"))
                .collect();
            sections.push(format!(
                "Learned aliases (preferred matches):\n{}",
                lines.join("\n")
            ));
        }
    }

    // Live lock states; on failure the annotation is simply skipped — the
    // fast path is opportunistic.
    let lock_states: std::collections::HashMap<String, String> =
        match ctx.hass.get_states(Some("lock")).await {
            Ok(states) => states.into_iter().map(|s| (s.entity_id, s.state)).collect(),
            Err(e) => {
                debug!("skipping lock-state annotations: {e}");
                Default::default()
            }
        };

    let cache = ctx.cache.read().await;
    for domain in PRIORITY_DOMAINS {
        let entities = cache.get_entities(Some(domain));
        if entities.is_empty() {
            continue;
        }
        let mut lines: Vec<(bool, String)> = entities
            .iter()
            .take(PRIORITY_DOMAIN_CAP)
            .map(|entity| {
                let mut line = format!("  {} ({})", entity.entity_id, entity.friendly_name);
                let mut defunct = false;
                if domain == "lock" {
                    let state = lock_states
                        .get(&entity.entity_id)
                        .map(String::as_str)
                        .unwrap_or("unknown");
                    defunct = matches!(state, "unknown" | "unavailable");
                    line.push_str(&format!(" [state: {state}]"));
                }
                (defunct, line)
            })
            .collect();
        // Working locks before unknown-state duplicates.
        lines.sort_by_key(|(defunct, _)| *defunct);
        let rendered: Vec<String> = lines.into_iter().map(|(_, line)| line).collect();
        sections.push(format!("{domain}:\n{}", rendered.join("\n")));
    }

    let mut other_domains = 0usize;
    for domain in cache.domains() {
        if PRIORITY_DOMAINS.contains(&domain.as_str()) {
            continue;
        }
        if other_domains >= OTHER_DOMAIN_LIMIT {
            break;
        }
        other_domains += 1;
        let lines: Vec<String> = cache
            .get_entities(Some(&domain))
            .iter()
            .take(OTHER_DOMAIN_CAP)
            .map(|entity| format!("  {} ({})", entity.entity_id, entity.friendly_name))
            .collect();
        sections.push(format!("{domain}:\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}

fn extraction_prompt(directory: &str, message: &str) -> String {
    format!(
        "Extract the intent and entity from this smart home command.\n\
         \n\
         Respond ONLY with JSON, no other text:\n\
         {{\"intent\": \"<intent>\", \"entity_id\": \"<id from the directory or null>\", \
         \"confidence\": \"<high/medium/low>\", \"value\": \"<value or null>\", \
         \"alias_to_save\": \"<user's nickname worth remembering, or null>\", \
         \"response\": \"<short confirmation phrase or null>\"}}\n\
         \n\
         Intents: turn_on, turn_off, toggle, lock, unlock, get_state, set_climate, set_brightness, unknown\n\
         The entity_id MUST be copied from the directory below, never invented.\n\
         \n\
         Entity directory:\n\
         {directory}\n\
         \n\
         Command: {message}"
    )
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    alias_to_save: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

fn first_json_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^{}]*\}").unwrap())
}

/// Tolerant parse: direct JSON first, then the first brace-delimited object
/// inside extraneous text.
fn parse_extraction(raw: &str) -> Option<RawExtraction> {
    let trimmed = raw.trim();
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Some(parsed);
    }
    let candidate = first_json_object().find(trimmed)?;
    serde_json::from_str(candidate.as_str()).ok()
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() || s == "null" => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Validate a parsed extraction against the entity cache.
///
/// A returned entity id that does not exist in the cache is discarded and
/// confidence is forced to low — the direct executor must never act on a
/// hallucinated identifier.
fn validate(raw: RawExtraction, known_entity: impl Fn(&str) -> bool, usage: TokenUsage) -> IntentOutcome {
    let intent = raw
        .intent
        .as_deref()
        .map(IntentKind::parse)
        .unwrap_or(IntentKind::Unknown);

    let mut confidence = match raw.confidence.as_deref() {
        Some("high") => Confidence::High,
        Some("medium") => Confidence::Medium,
        _ => Confidence::Low,
    };

    let entity_id = raw.entity_id.filter(|id| !id.is_empty() && id != "null");
    let entity_id = match entity_id {
        Some(id) if known_entity(&id) => Some(id),
        Some(id) => {
            warn!("extraction returned unknown entity id '{id}', discarding");
            confidence = Confidence::Low;
            None
        }
        None => None,
    };

    let needs_full = intent == IntentKind::Unknown
        || confidence == Confidence::Low
        || (intent.requires_entity() && entity_id.is_none());

    if needs_full {
        return IntentOutcome::NeedsFullAgent { usage };
    }

    IntentOutcome::Simple(ExtractedIntent {
        intent,
        entity_id,
        confidence,
        value: raw.value.and_then(value_to_string),
        alias_to_save: raw.alias_to_save.filter(|a| !a.is_empty() && a != "null"),
        response: raw.response.filter(|r| !r.is_empty() && r != "null"),
        usage,
    })
}

/// Classify a message, spending at most one small backend call.
pub async fn extract_intent(ctx: &AgentContext, message: &str) -> IntentOutcome {
    if needs_full_agent(message) {
        info!("message needs full agent: '{}'", truncate(message, 50));
        return IntentOutcome::NeedsFullAgent {
            usage: TokenUsage::default(),
        };
    }

    let directory = build_entity_directory(ctx).await;
    let request = ChatRequest::simple(
        ctx.current_model().await,
        extraction_prompt(&directory, message),
        EXTRACTION_MAX_TOKENS,
    );

    let response = match ctx.llm.chat(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("intent extraction failed, falling back to full agent: {e}");
            return IntentOutcome::NeedsFullAgent {
                usage: TokenUsage::default(),
            };
        }
    };

    let usage = response.usage;
    let Some(raw) = parse_extraction(&response.text()) else {
        warn!("could not parse extraction payload: {}", truncate(&response.text(), 120));
        return IntentOutcome::NeedsFullAgent { usage };
    };

    let cache = ctx.cache.read().await;
    let outcome = validate(raw, |id| cache.get_entity(id).is_some(), usage);
    if let IntentOutcome::Simple(intent) = &outcome {
        info!(
            "extracted intent {:?} for {:?} ({} + {} tokens)",
            intent.intent, intent.entity_id, usage.input_tokens, usage.output_tokens
        );
    }
    outcome
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
