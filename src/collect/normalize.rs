//! Normalization of raw ZoneMinder record fields.
//!
//! Upstream field names are camel-cased and their values arrive as strings,
//! numbers, or null depending on platform version. Everything that maps a
//! raw field onto a stable metric identifier or numeric encoding lives here,
//! including the Enabled/Capturing compatibility shim for the 1.38 schema
//! break.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::api::types::MonitorRecord;

static CAMEL_PASS1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("camel pass 1 regex is valid"));
static CAMEL_PASS2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel pass 2 regex is valid"));

/// Convert a camel-cased upstream field name to a snake_case identifier.
///
/// `SaveJPEGs` is special-cased; the generic word-boundary rule would
/// mis-segment it.
pub fn camel_to_snake(name: &str) -> String {
    if name == "SaveJPEGs" {
        return "save_jpegs".to_string();
    }
    let pass1 = CAMEL_PASS1.replace_all(name, "${1}_${2}");
    CAMEL_PASS2
        .replace_all(&pass1, "${1}_${2}")
        .to_lowercase()
}

/// Whether the monitor is enabled, reconciling both schema generations.
///
/// ZoneMinder 1.38 dropped the meaning of `Enabled` (always 0) and replaced
/// it with `Capturing`; when `Capturing` is present it wins, anything but
/// the literal "None" counting as enabled. Evaluated per monitor because a
/// mixed fleet can serve both shapes.
pub fn monitor_enabled(rec: &MonitorRecord) -> f64 {
    match rec.capturing.as_deref() {
        Some(capturing) => {
            if capturing == "None" {
                0.0
            } else {
                1.0
            }
        }
        None => rec
            .enabled
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0),
    }
}

/// A raw field rendered for an info label. Absent or null becomes "".
pub fn field_display(rec: &MonitorRecord, name: &str) -> String {
    match rec.fields.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// A configuration number field. Absent, null, or unparseable becomes 0.
pub fn field_num(rec: &MonitorRecord, name: &str) -> f64 {
    match rec.fields.get(name) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// A feature-enable flag field; absent means disabled.
pub fn field_flag(rec: &MonitorRecord, name: &str) -> f64 {
    if rec.fields.contains_key(name) {
        field_num(rec, name)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: serde_json::Value) -> MonitorRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_camel_to_snake_table() {
        for (input, expected) in [
            ("DecodingEnabled", "decoding_enabled"),
            ("SaveJPEGs", "save_jpegs"),
            ("ZoneCount", "zone_count"),
            ("Width", "width"),
            ("MaxImageBufferCount", "max_image_buffer_count"),
            ("RefBlendPerc", "ref_blend_perc"),
            ("ServerId", "server_id"),
            ("OutputCodecName", "output_codec_name"),
        ] {
            assert_eq!(camel_to_snake(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_enabled_shim_prefers_capturing() {
        let rec = record(json!({ "Id": "1", "Name": "m", "Capturing": "None" }));
        assert_eq!(monitor_enabled(&rec), 0.0);

        let rec = record(json!({ "Id": "1", "Name": "m", "Capturing": "Always" }));
        assert_eq!(monitor_enabled(&rec), 1.0);

        let rec = record(json!({ "Id": "1", "Name": "m", "Capturing": "Ondemand" }));
        assert_eq!(monitor_enabled(&rec), 1.0);
    }

    #[test]
    fn test_enabled_shim_legacy_fallback() {
        let rec = record(json!({ "Id": "1", "Name": "m", "Enabled": "1" }));
        assert_eq!(monitor_enabled(&rec), 1.0);

        let rec = record(json!({ "Id": "1", "Name": "m", "Enabled": "0" }));
        assert_eq!(monitor_enabled(&rec), 0.0);

        // Capturing present overrides a contradictory legacy flag.
        let rec = record(json!({ "Id": "1", "Name": "m", "Enabled": "1", "Capturing": "None" }));
        assert_eq!(monitor_enabled(&rec), 0.0);
    }

    #[test]
    fn test_field_num_defaults() {
        let rec = record(json!({
            "Id": "1", "Name": "m",
            "Width": "1920", "Height": 1080, "Palette": null, "TrackMotion": "garbage"
        }));
        assert_eq!(field_num(&rec, "Width"), 1920.0);
        assert_eq!(field_num(&rec, "Height"), 1080.0);
        assert_eq!(field_num(&rec, "Palette"), 0.0);
        assert_eq!(field_num(&rec, "TrackMotion"), 0.0);
        assert_eq!(field_num(&rec, "ZoneCount"), 0.0);
    }

    #[test]
    fn test_field_flag_absent_is_disabled() {
        let rec = record(json!({ "Id": "1", "Name": "m", "JanusEnabled": "1" }));
        assert_eq!(field_flag(&rec, "JanusEnabled"), 1.0);
        assert_eq!(field_flag(&rec, "Go2RTCEnabled"), 0.0);
    }

    #[test]
    fn test_field_display() {
        let rec = record(json!({ "Id": "1", "Name": "m", "Device": "/dev/video0", "Channel": 0 }));
        assert_eq!(field_display(&rec, "Device"), "/dev/video0");
        assert_eq!(field_display(&rec, "Channel"), "0");
        assert_eq!(field_display(&rec, "Encoder"), "");
    }
}
