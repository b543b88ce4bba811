//! Configuration module for the exporter.
//!
//! Everything comes from environment variables; only the API URL is
//! required.

use std::env;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("you must set the {0:?} environment variable")]
    MissingRequired(&'static str),
    #[error("invalid value for {name:?}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Exporter configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Base URL of the ZoneMinder API, e.g. `http://zm.example.com/zm/api`.
    pub api_url: String,
    /// Optional API username; only used together with `password`.
    pub user: Option<String>,
    /// Optional API password; only used together with `user`.
    pub password: Option<String>,
    /// Optional zmeventnotification websocket URL; unset disables the probe.
    pub zmes_websocket_url: Option<String>,
    /// Port for the metrics endpoint (default: 8080).
    pub http_port: u16,
    /// Bind address for the metrics endpoint (default: "0.0.0.0").
    pub bind_addr: String,
}

impl ExporterConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ZM_API_URL`: ZoneMinder API base URL (required)
    /// - `ZM_USER` / `ZM_PASSWORD`: API credentials (optional, paired)
    /// - `ZMES_WEBSOCKET_URL`: event-server websocket URL (optional)
    /// - `ZM_EXPORTER_PORT`: listen port (default: 8080)
    /// - `ZM_EXPORTER_BIND`: bind address (default: "0.0.0.0")
    pub fn load() -> Result<Self, ConfigError> {
        let api_url = non_empty(env::var("ZM_API_URL").ok())
            .ok_or(ConfigError::MissingRequired("ZM_API_URL"))?;

        let http_port = match env::var("ZM_EXPORTER_PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::Invalid {
                name: "ZM_EXPORTER_PORT",
                value: s,
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            api_url,
            user: non_empty(env::var("ZM_USER").ok()),
            password: non_empty(env::var("ZM_PASSWORD").ok()),
            zmes_websocket_url: non_empty(env::var("ZMES_WEBSOCKET_URL").ok()),
            http_port,
            bind_addr: non_empty(env::var("ZM_EXPORTER_BIND").ok())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
        })
    }

    /// The credential pair, if usable.
    ///
    /// Authentication needs both halves; with only one set a warning is
    /// logged and the exporter proceeds unauthenticated.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) => Some((u, p)),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "both ZM_USER and ZM_PASSWORD must be provided for authentication; \
                     only one was set, proceeding without auth"
                );
                None
            }
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}
