//! reqwest-backed Home Assistant client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use homemind_core::entity::{Entity, domain_of};

use crate::api::HomeAssistant;
use crate::error::{HassError, Result};
use crate::types::{AutomationSpec, EntityState, HistoryEntry};

/// Request timeout. A hung call must not stall a conversation turn forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Async client for the Home Assistant REST API.
pub struct HassClient {
    base_url: String,
    client: reqwest::Client,
}

impl HassClient {
    /// Create a client for the given base URL and long-lived access token.
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HassError::InvalidResponse("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HassError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl HomeAssistant for HassClient {
    async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        self.get_json(&format!("states/{entity_id}")).await
    }

    async fn get_states(&self, domain: Option<&str>) -> Result<Vec<EntityState>> {
        let mut states: Vec<EntityState> = self.get_json("states").await?;
        if let Some(domain) = domain {
            states.retain(|s| domain_of(&s.entity_id) == Some(domain));
        }
        Ok(states)
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: Option<&str>,
        data: Option<Value>,
    ) -> Result<Value> {
        let mut payload = match data {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(HassError::InvalidResponse(format!(
                    "service data must be an object, got {other}"
                )));
            }
            None => serde_json::Map::new(),
        };
        if let Some(entity_id) = entity_id {
            payload.insert("entity_id".to_string(), entity_id.into());
        }
        debug!(domain, service, ?entity_id, "calling service");
        self.post_json(&format!("services/{domain}/{service}"), &Value::Object(payload))
            .await
    }

    async fn get_history(&self, entity_id: &str, hours: u32) -> Result<Vec<Vec<HistoryEntry>>> {
        let start = (Utc::now() - ChronoDuration::hours(i64::from(hours)))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        self.get_json(&format!(
            "history/period/{start}?filter_entity_id={entity_id}"
        ))
        .await
    }

    async fn get_entity_registry(&self) -> Result<Vec<Entity>> {
        // The REST API exposes no registry endpoint; derive metadata from the
        // state listing, which carries everything the cache needs.
        let states = self.get_states(None).await?;
        Ok(states
            .into_iter()
            .map(|s| {
                let friendly_name = s.friendly_name().to_string();
                let device_class = s.device_class().map(str::to_string);
                let mut entity = Entity::new(s.entity_id, friendly_name);
                entity.device_class = device_class;
                entity
            })
            .collect())
    }

    async fn get_services(&self) -> Result<BTreeMap<String, Vec<String>>> {
        #[derive(serde::Deserialize)]
        struct DomainServices {
            domain: String,
            #[serde(default)]
            services: serde_json::Map<String, Value>,
        }

        let raw: Vec<DomainServices> = self.get_json("services").await?;
        Ok(raw
            .into_iter()
            .map(|d| (d.domain, d.services.keys().cloned().collect()))
            .collect())
    }

    async fn get_areas(&self) -> Result<Vec<Value>> {
        // Areas are only reachable over the websocket API.
        Ok(Vec::new())
    }

    async fn get_devices(&self) -> Result<Vec<Value>> {
        // Devices are only reachable over the websocket API.
        Ok(Vec::new())
    }

    async fn trigger_automation(&self, entity_id: &str) -> Result<()> {
        self.call_service("automation", "trigger", Some(entity_id), None)
            .await?;
        Ok(())
    }

    async fn create_automation(&self, spec: AutomationSpec) -> Result<String> {
        let config_id = uuid::Uuid::new_v4().simple().to_string();
        let body = serde_json::to_value(&spec)
            .map_err(|e| HassError::InvalidResponse(e.to_string()))?;
        let _: Value = self
            .post_json(&format!("config/automation/config/{config_id}"), &body)
            .await?;
        Ok(config_id)
    }

    async fn list_automations(&self) -> Result<Vec<EntityState>> {
        self.get_states(Some("automation")).await
    }

    async fn delete_automation(&self, config_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&format!("config/automation/config/{config_id}")))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HassError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn check_connection(&self) -> bool {
        match self.get_json::<Value>("").await {
            Ok(_) => true,
            Err(e) => {
                error!("Home Assistant connection check failed: {e}");
                false
            }
        }
    }
}

impl HassClient {
    /// Log a one-line summary of reachable metadata, used at startup.
    pub async fn log_summary(&self) {
        match self.get_states(None).await {
            Ok(states) => debug!("Home Assistant reachable, {} entities", states.len()),
            Err(e) => warn!("Home Assistant summary unavailable: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let client = HassClient::new("http://hass.local:8123/", "token").unwrap();
        assert_eq!(
            client.endpoint("states/light.kitchen_main"),
            "http://hass.local:8123/api/states/light.kitchen_main"
        );
    }

    #[test]
    fn test_rejects_invalid_token() {
        assert!(HassClient::new("http://hass.local:8123", "bad\ntoken").is_err());
    }
}
