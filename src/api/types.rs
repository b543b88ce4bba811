//! Record types for the ZoneMinder management API.
//!
//! ZoneMinder serializes most numbers as JSON strings, and several fields
//! changed presence or meaning across the 1.36 → 1.38 schema break, so the
//! typed fields here are optional and the numeric deserializers accept
//! either representation.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One entry from `monitors.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorEntry {
    #[serde(rename = "Monitor")]
    pub monitor: MonitorRecord,
    #[serde(rename = "Monitor_Status")]
    pub status: MonitorStatus,
    #[serde(rename = "Event_Summary")]
    pub events: EventSummary,
}

/// The `Monitor` record proper.
///
/// Fields consulted by name (the info/config tables) stay in the flattened
/// raw map; only identity and the version-sensitive mode fields are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorRecord {
    #[serde(rename = "Id", deserialize_with = "de_flex_u32")]
    pub id: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Function", default)]
    pub function: Option<String>,
    /// Legacy (pre-1.38) enabled flag.
    #[serde(rename = "Enabled", default, deserialize_with = "de_opt_string")]
    pub enabled: Option<String>,
    /// 1.38+ replacement for `Enabled`.
    #[serde(rename = "Capturing", default)]
    pub capturing: Option<String>,
    #[serde(rename = "Analysing", default)]
    pub analysing: Option<String>,
    #[serde(rename = "Recording", default)]
    pub recording: Option<String>,
    #[serde(rename = "Decoding", default)]
    pub decoding: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// The live `Monitor_Status` sub-record.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorStatus {
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "CaptureFPS", default, deserialize_with = "de_flex_f64")]
    pub capture_fps: f64,
    #[serde(rename = "AnalysisFPS", default, deserialize_with = "de_flex_f64")]
    pub analysis_fps: f64,
    #[serde(rename = "CaptureBandwidth", default, deserialize_with = "de_flex_f64")]
    pub capture_bandwidth: f64,
}

/// Event totals; ZoneMinder reports null for monitors with no events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "TotalEvents", default, deserialize_with = "de_opt_flex_f64")]
    pub total_events: Option<f64>,
    #[serde(
        rename = "TotalEventDiskSpace",
        default,
        deserialize_with = "de_opt_flex_f64"
    )]
    pub total_event_disk_space: Option<f64>,
    #[serde(rename = "ArchivedEvents", default, deserialize_with = "de_opt_flex_f64")]
    pub archived_events: Option<f64>,
    #[serde(
        rename = "ArchivedEventDiskSpace",
        default,
        deserialize_with = "de_opt_flex_f64"
    )]
    pub archived_event_disk_space: Option<f64>,
}

/// One entry from `states.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "Id", deserialize_with = "de_flex_u32")]
    pub id: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Definition", default)]
    pub definition: String,
    #[serde(rename = "IsActive", deserialize_with = "de_flex_f64")]
    pub is_active: f64,
}

/// Per-monitor zmc daemon status from `monitors/daemonStatus`.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonStatus {
    #[serde(rename = "status", deserialize_with = "de_flex_bool")]
    pub status: bool,
    #[serde(rename = "statustext", default)]
    pub statustext: String,
}

// Flexible deserializers for ZoneMinder's string-or-number JSON.

fn de_flex_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| serde::de::Error::custom("number out of range for u32")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {other}"
        ))),
    }
}

fn de_flex_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Ok(s.trim().parse().unwrap_or(0.0)),
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        other => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}

fn de_opt_flex_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => Ok(s.trim().parse().ok()),
        Value::Bool(b) => Ok(Some(if b { 1.0 } else { 0.0 })),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_flex_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Value::deserialize(d)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        Value::String(s) => Ok(!matches!(s.as_str(), "" | "0" | "false")),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected boolean, got {other}"
        ))),
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(if b { "1" } else { "0" }.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string, got {other}"
        ))),
    }
}
