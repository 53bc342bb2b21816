//! Configuration loading.
//!
//! Settings come from a TOML file; secrets come only from environment
//! variables and are wrapped in [`Secret`] so they never end up in logs.
//! A missing secret or a malformed file is fatal at startup — the process
//! must not start degraded.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable holding the Home Assistant long-lived access token.
pub const ENV_HASS_TOKEN: &str = "HASS_TOKEN";
/// Environment variable holding the reasoning-backend API key.
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Environment variable holding the Telegram bot token.
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";

/// Model tiers selectable at runtime: (friendly name, model id, description).
pub const MODEL_TIERS: [(&str, &str, &str); 3] = [
    ("haiku", "claude-haiku-4-5", "Fastest, cheapest"),
    ("sonnet", "claude-sonnet-4-5", "Balanced"),
    ("opus", "claude-opus-4-1", "Most capable"),
];

/// Resolve a friendly model name to its full model id.
pub fn resolve_model(name: &str) -> Option<&'static str> {
    MODEL_TIERS
        .iter()
        .find(|(friendly, _, _)| *friendly == name)
        .map(|(_, id, _)| *id)
}

/// Friendly name of a model id, falling back to the id itself.
pub fn friendly_model_name(model_id: &str) -> &str {
    MODEL_TIERS
        .iter()
        .find(|(_, id, _)| *id == model_id)
        .map(|(friendly, _, _)| *friendly)
        .unwrap_or(model_id)
}

/// A secret string that never prints its contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Home Assistant connection settings.
#[derive(Debug, Clone)]
pub struct HassConfig {
    pub url: String,
    pub token: Secret,
}

/// Reasoning backend settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Secret,
    pub endpoint: String,
    /// Full model id (friendly names from the file are resolved at load).
    pub model: String,
    /// Conversation history is trimmed to this many user/assistant pairs.
    pub max_history: usize,
}

/// Telegram transport settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: Secret,
    /// Empty list allows all users (with a startup warning).
    pub authorized_users: Vec<i64>,
    /// Destination for scheduled-task output and failure reports.
    pub notification_chat_id: Option<i64>,
}

/// Entity cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub refresh_interval_hours: u64,
    pub data_dir: PathBuf,
}

/// One cron-style scheduled prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTask {
    pub name: String,
    /// Five-field cron expression (minute hour day month weekday).
    pub cron: String,
    pub prompt: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hass: HassConfig,
    pub llm: LlmConfig,
    pub telegram: TelegramConfig,
    pub cache: CacheConfig,
    pub schedules: Vec<ScheduleTask>,
}

// Raw shape of the TOML file. Secrets are deliberately absent.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    home_assistant: HassSection,
    #[serde(default)]
    llm: LlmSection,
    #[serde(default)]
    telegram: TelegramSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    schedules: Vec<ScheduleTask>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HassSection {
    url: String,
}

impl Default for HassSection {
    fn default() -> Self {
        Self {
            url: "http://homeassistant.local:8123".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LlmSection {
    endpoint: String,
    model: String,
    max_history: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "sonnet".to_string(),
            max_history: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TelegramSection {
    authorized_users: Vec<i64>,
    notification_chat_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CacheSection {
    refresh_interval_hours: u64,
    data_dir: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            refresh_interval_hours: 6,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Secrets pulled from the environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub hass_token: Secret,
    pub api_key: Secret,
    pub telegram_token: Secret,
}

impl Secrets {
    /// Read all required secrets from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            hass_token: require_env(ENV_HASS_TOKEN)?,
            api_key: require_env(ENV_API_KEY)?,
            telegram_token: require_env(ENV_TELEGRAM_TOKEN)?,
        })
    }
}

fn require_env(name: &str) -> Result<Secret> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Secret::new(value.trim().to_string())),
        _ => Err(Error::config(format!(
            "{name} environment variable is required"
        ))),
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and environment secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let secrets = Secrets::from_env()?;
        Self::from_toml(&raw, secrets)
    }

    /// Build a configuration from raw TOML text plus secrets.
    pub fn from_toml(raw: &str, secrets: Secrets) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(raw).map_err(|e| Error::config(format!("invalid config: {e}")))?;

        let model = resolve_model(&file.llm.model)
            .map(str::to_string)
            .unwrap_or(file.llm.model);

        Ok(Self {
            hass: HassConfig {
                url: file.home_assistant.url.trim_end_matches('/').to_string(),
                token: secrets.hass_token,
            },
            llm: LlmConfig {
                api_key: secrets.api_key,
                endpoint: file.llm.endpoint.trim_end_matches('/').to_string(),
                model,
                max_history: file.llm.max_history,
            },
            telegram: TelegramConfig {
                token: secrets.telegram_token,
                authorized_users: file.telegram.authorized_users,
                notification_chat_id: file.telegram.notification_chat_id,
            },
            cache: CacheConfig {
                refresh_interval_hours: file.cache.refresh_interval_hours,
                data_dir: file.cache.data_dir,
            },
            schedules: file.schedules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secrets() -> Secrets {
        Secrets {
            hass_token: Secret::new("hass"),
            api_key: Secret::new("key"),
            telegram_token: Secret::new("tg"),
        }
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml("", test_secrets()).unwrap();
        assert_eq!(config.hass.url, "http://homeassistant.local:8123");
        assert_eq!(config.llm.model, "claude-sonnet-4-5");
        assert_eq!(config.llm.max_history, 10);
        assert_eq!(config.cache.refresh_interval_hours, 6);
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn test_full_file() {
        let raw = r#"
            [home_assistant]
            url = "http://hass.local:8123/"

            [llm]
            model = "haiku"
            max_history = 4

            [telegram]
            authorized_users = [12345]
            notification_chat_id = 67890

            [[schedules]]
            name = "morning report"
            cron = "0 7 * * *"
            prompt = "Summarize the house status."
        "#;
        let config = AppConfig::from_toml(raw, test_secrets()).unwrap();
        assert_eq!(config.hass.url, "http://hass.local:8123");
        assert_eq!(config.llm.model, "claude-haiku-4-5");
        assert_eq!(config.telegram.authorized_users, vec![12345]);
        assert_eq!(config.schedules.len(), 1);
        assert!(config.schedules[0].enabled);
    }

    #[test]
    fn test_unknown_model_passes_through() {
        let raw = "[llm]\nmodel = \"claude-custom-1\"\n";
        let config = AppConfig::from_toml(raw, test_secrets()).unwrap();
        assert_eq!(config.llm.model, "claude-custom-1");
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let err = AppConfig::from_toml("not [valid", test_secrets()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_secret_debug_is_masked() {
        let secret = Secret::new("very-secret-token");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }

    #[test]
    fn test_model_resolution() {
        assert_eq!(resolve_model("opus"), Some("claude-opus-4-1"));
        assert_eq!(resolve_model("nope"), None);
        assert_eq!(friendly_model_name("claude-haiku-4-5"), "haiku");
    }
}
