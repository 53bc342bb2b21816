//! Direct execution of validated simple intents.
//!
//! One external-API action per intent, without the overhead of the full
//! reasoning loop. Downstream failures are converted to a templated failure
//! message — the executor never raises toward the transport.

use std::sync::OnceLock;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{info, warn};

use homemind_core::entity::coerce_domain;

use crate::context::AgentContext;
use crate::intent::{ExtractedIntent, IntentKind};

/// Confirmation templates with an injected RNG, so repeated interactions do
/// not feel robotic and tests can seed for determinism.
pub struct Responder {
    rng: StdRng,
}

impl Responder {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick a confirmation for a successful action.
    pub fn confirm(&mut self, intent: IntentKind, name: &str) -> String {
        let options: Vec<String> = match intent {
            IntentKind::TurnOn => vec![
                format!("Done! {name} is now on."),
                format!("Turned on {name}."),
                format!("{name} is on now."),
            ],
            IntentKind::TurnOff => vec![
                format!("Done! {name} is now off."),
                format!("Turned off {name}."),
                format!("{name} is off now."),
            ],
            IntentKind::Toggle => vec![
                format!("Toggled {name}."),
                format!("Done! {name} has been toggled."),
            ],
            IntentKind::Lock => vec![
                format!("Locked {name}."),
                format!("Done! {name} is now locked."),
                format!("{name} is secured."),
            ],
            IntentKind::Unlock => vec![
                format!("Unlocked {name}."),
                format!("Done! {name} is now unlocked."),
            ],
            IntentKind::SetClimate => vec![
                format!("Climate adjusted for {name}."),
                "Done! Temperature settings updated.".to_string(),
            ],
            IntentKind::SetBrightness => vec![
                format!("Brightness set for {name}."),
                format!("Done! {name} has been dimmed to the new level."),
            ],
            _ => Vec::new(),
        };
        options
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| format!("Done! Completed {} {name}.", intent.verb()))
    }

    /// Failure message for a failed downstream call. Always names the intent
    /// verb and the entity.
    pub fn failure(intent: IntentKind, name: &str) -> String {
        format!(
            "Sorry, I couldn't {} {name}. Please try again.",
            intent.verb()
        )
    }
}

impl Default for Responder {
    fn default() -> Self {
        Self::new()
    }
}

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(\.\d+)?").unwrap())
}

/// Pull a numeric value out of free text, ignoring degree/unit markers
/// ("72°F" → 72.0).
fn parse_numeric(value: &str) -> Option<f64> {
    number_pattern()
        .find(value)?
        .as_str()
        .parse()
        .ok()
}

/// Execute a validated simple intent against the smart-home API.
///
/// Returns `None` when the intent cannot be executed directly (no resolvable
/// entity, missing value) — the caller falls back to the full loop. Returns
/// `Some(reply)` for both success and converted failures.
pub async fn execute_direct(ctx: &AgentContext, intent: &ExtractedIntent) -> Option<String> {
    let entity_id = match intent.intent {
        IntentKind::Lock | IntentKind::Unlock => intent
            .entity_id
            .as_deref()
            .map(|id| coerce_domain(id, "lock")),
        IntentKind::SetClimate => match intent.entity_id.clone() {
            Some(id) => Some(id),
            // Thermostats are typically singular per home.
            None => {
                let cache = ctx.cache.read().await;
                cache
                    .get_entities(Some("climate"))
                    .first()
                    .map(|e| e.entity_id.clone())
            }
        },
        IntentKind::Unknown => None,
        _ => intent.entity_id.clone(),
    };
    let entity_id = entity_id?;

    let display_name = {
        let cache = ctx.cache.read().await;
        cache
            .get_entity(&entity_id)
            .map(|e| e.friendly_name.clone())
            .unwrap_or_else(|| entity_id.clone())
    };

    let result = dispatch(ctx, intent, &entity_id, &display_name).await;

    let reply = match result {
        Ok(Some(reply)) => reply,
        Ok(None) => return None,
        Err(e) => {
            warn!("direct execution of {:?} on {entity_id} failed: {e}", intent.intent);
            return Some(Responder::failure(intent.intent, &display_name));
        }
    };

    if let Some(alias) = &intent.alias_to_save {
        let mut aliases = ctx.aliases.lock().await;
        if let Err(e) = aliases.learn(alias, &entity_id) {
            warn!("failed to persist alias '{alias}': {e}");
        }
    }

    info!("direct execution: {:?} on {entity_id}", intent.intent);
    Some(reply)
}

async fn dispatch(
    ctx: &AgentContext,
    intent: &ExtractedIntent,
    entity_id: &str,
    display_name: &str,
) -> homemind_hass::Result<Option<String>> {
    match intent.intent {
        IntentKind::TurnOn => {
            ctx.hass.turn_on(entity_id, None).await?;
        }
        IntentKind::TurnOff => {
            ctx.hass.turn_off(entity_id).await?;
        }
        IntentKind::Toggle => {
            ctx.hass.toggle(entity_id).await?;
        }
        IntentKind::Lock => {
            ctx.hass.lock(entity_id).await?;
        }
        IntentKind::Unlock => {
            ctx.hass.unlock(entity_id).await?;
        }
        IntentKind::GetState => {
            let state = ctx.hass.get_state(entity_id).await?;
            let mut rendered = format!("{display_name} is {}", state.state);
            if let Some(unit) = state.unit_of_measurement() {
                rendered.push_str(&format!(" {unit}"));
            }
            rendered.push('.');
            return Ok(Some(rendered));
        }
        IntentKind::SetClimate => {
            let Some(temperature) = intent.value.as_deref().and_then(parse_numeric) else {
                return Ok(None);
            };
            ctx.hass
                .set_climate(entity_id, Some(temperature), None)
                .await?;
        }
        IntentKind::SetBrightness => {
            let Some(percent) = intent.value.as_deref().and_then(parse_numeric) else {
                return Ok(None);
            };
            // Platform brightness is 0-255; users speak in percent.
            let brightness = ((percent.clamp(0.0, 100.0) / 100.0) * 255.0).round() as u64;
            ctx.hass
                .turn_on(
                    entity_id,
                    Some(serde_json::json!({ "brightness": brightness })),
                )
                .await?;
        }
        IntentKind::Unknown => return Ok(None),
    }

    if let Some(prerendered) = intent.response.clone() {
        return Ok(Some(prerendered));
    }
    let mut responder = ctx.responder.lock().await;
    Ok(Some(responder.confirm(intent.intent, display_name)))
}
