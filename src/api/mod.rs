//! ZoneMinder management API client.

pub mod types;

pub use types::{DaemonStatus, MonitorEntry, StateRecord};

use std::future::Future;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ExporterConfig;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("authentication failed: {0}")]
    Auth(String),
}

/// The upstream API surface the collectors consume.
///
/// Abstracted as a trait so collection can be exercised against a fake
/// backend in tests. Futures are `Send` so handlers stay spawnable.
pub trait Backend {
    /// Fetch the full monitor list. `force_reload` bypasses the client's
    /// cached copy; collectors always force so configuration changes are
    /// visible on the next scrape.
    fn list_monitors(
        &self,
        force_reload: bool,
    ) -> impl Future<Output = Result<Vec<MonitorEntry>, ApiError>> + Send;

    /// Fetch the zmc daemon status for one monitor.
    fn daemon_status(
        &self,
        monitor_id: u32,
    ) -> impl Future<Output = Result<DaemonStatus, ApiError>> + Send;

    /// Fetch the named run-state list.
    fn list_states(&self) -> impl Future<Output = Result<Vec<StateRecord>, ApiError>> + Send;

    /// Hit `host/daemonCheck.json` and return its boolean result.
    fn daemon_check(&self) -> impl Future<Output = Result<bool, ApiError>> + Send;
}

/// HTTP client for a ZoneMinder API endpoint.
pub struct ZmClient {
    http: reqwest::Client,
    base_url: String,
    /// Access token from `host/login.json`, when credentials were supplied.
    token: Option<String>,
    monitor_cache: Mutex<Option<Vec<MonitorEntry>>>,
}

impl ZmClient {
    /// Build a client and, if credentials are configured, log in.
    pub async fn connect(cfg: &ExporterConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Http {
                url: cfg.api_url.clone(),
                source: e,
            })?;
        let base_url = cfg.api_url.trim_end_matches('/').to_string();
        let mut client = Self {
            http,
            base_url,
            token: None,
            monitor_cache: Mutex::new(None),
        };
        if let Some((user, password)) = cfg.credentials() {
            tracing::info!(user, "authenticating against the ZoneMinder API");
            client.token = Some(client.login(user, password).await?);
        } else {
            tracing::info!("no credentials configured; connecting without auth");
        }
        Ok(client)
    }

    async fn login(&self, user: &str, password: &str) -> Result<String, ApiError> {
        let url = format!("{}/host/login.json", self.base_url);
        let resp: Value = self
            .http
            .post(&url)
            .form(&[("user", user), ("pass", password)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?
            .json()
            .await
            .map_err(|e| ApiError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        resp.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Auth("login response carried no access_token".into()))
    }

    /// Authenticated GET returning decoded JSON.
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, "GET");
        let mut req = self.http.get(&url);
        if let Some(token) = &self.token {
            req = req.query(&[("token", token.as_str())]);
        }
        let resp = req
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?;
        resp.json().await.map_err(|e| ApiError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    fn decode_list<T: serde::de::DeserializeOwned>(
        url: &str,
        body: Value,
        outer: &str,
        inner: &str,
    ) -> Result<Vec<T>, ApiError> {
        let entries = body
            .get(outer)
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::Decode {
                url: url.to_string(),
                reason: format!("missing {outer:?} array"),
            })?;
        entries
            .iter()
            .map(|e| {
                let record = if inner.is_empty() { e } else { &e[inner] };
                serde_json::from_value(record.clone()).map_err(|err| ApiError::Decode {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            })
            .collect()
    }
}

impl Backend for ZmClient {
    async fn list_monitors(&self, force_reload: bool) -> Result<Vec<MonitorEntry>, ApiError> {
        let mut cache = self.monitor_cache.lock().await;
        if !force_reload {
            if let Some(cached) = cache.as_ref() {
                return Ok(cached.clone());
            }
        }
        let body = self.get_json("monitors.json").await?;
        let monitors: Vec<MonitorEntry> =
            Self::decode_list(&format!("{}/monitors.json", self.base_url), body, "monitors", "")?;
        *cache = Some(monitors.clone());
        Ok(monitors)
    }

    async fn daemon_status(&self, monitor_id: u32) -> Result<DaemonStatus, ApiError> {
        let path = format!("monitors/daemonStatus/id:{monitor_id}/daemon:zmc.json");
        let body = self.get_json(&path).await?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode {
            url: format!("{}/{}", self.base_url, path),
            reason: e.to_string(),
        })
    }

    async fn list_states(&self) -> Result<Vec<StateRecord>, ApiError> {
        let body = self.get_json("states.json").await?;
        Self::decode_list(
            &format!("{}/states.json", self.base_url),
            body,
            "states",
            "State",
        )
    }

    async fn daemon_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/host/daemonCheck.json", self.base_url);
        let body = self.get_json("host/daemonCheck.json").await?;
        tracing::debug!(%url, response = %body, "daemon check");
        match body.get("result") {
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => Ok(s == "1"),
            _ => Err(ApiError::Decode {
                url,
                reason: "missing \"result\" field".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_list_monitors_shape() {
        let body = json!({ "monitors": [ {
            "Monitor": { "Id": "1", "Name": "gate" },
            "Monitor_Status": { "Status": "Connected" },
            "Event_Summary": {}
        } ] });
        let monitors: Vec<MonitorEntry> =
            ZmClient::decode_list("http://zm/api/monitors.json", body, "monitors", "").unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].monitor.name, "gate");
    }

    #[test]
    fn test_decode_list_states_unwraps_inner_record() {
        let body = json!({ "states": [
            { "State": { "Id": "1", "Name": "Away", "Definition": "", "IsActive": "0" } }
        ] });
        let states: Vec<StateRecord> =
            ZmClient::decode_list("http://zm/api/states.json", body, "states", "State").unwrap();
        assert_eq!(states[0].name, "Away");
    }

    #[test]
    fn test_decode_list_missing_array_is_error() {
        let err = ZmClient::decode_list::<StateRecord>(
            "http://zm/api/states.json",
            json!({}),
            "states",
            "State",
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
