//! Monitor collection: identity, per-process status, modes, configuration,
//! and event totals for every configured monitor.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::normalize::{camel_to_snake, field_display, field_flag, field_num, monitor_enabled};
use super::status::parse_status_line;
use super::CollectError;
use crate::api::Backend;
use crate::metrics::{LabeledStateSet, MetricFamily};

const FUNCTION_STATES: &[&str] = &["None", "Monitor", "Modect", "Record", "Mocord", "Nodect"];
const CAPTURING_STATES: &[&str] = &["None", "Ondemand", "Always"];
const ANALYSING_STATES: &[&str] = &["None", "Always"];
const RECORDING_STATES: &[&str] = &["None", "OnMotion", "Always"];
const DECODING_STATES: &[&str] = &[
    "None",
    "Ondemand",
    "KeyFrames",
    "KeyFrames+Ondemand",
    "Always",
];

/// Identity/config fields always expected on a monitor record.
const INFO_FIELDS: &[&str] = &[
    "ServerId",
    "StorageId",
    "Type",
    "DecodingEnabled",
    "Device",
    "Channel",
    "Format",
    "Method",
    "Encoder",
    "RecordAudio",
    "EventPrefix",
    "Controllable",
    "ControlId",
    "Importance",
];

/// Identity fields only present on newer platform versions.
const OPTIONAL_INFO_FIELDS: &[&str] = &[
    "Capturing",
    "Analysing",
    "Recording",
    "Decoding",
    "OutputCodecName",
];

/// Integer configuration fields emitted as individual gauges.
const INT_FIELDS: &[&str] = &[
    "DecodingEnabled",
    "Width",
    "Height",
    "Colours",
    "Palette",
    "SaveJPEGs",
    "VideoWriter",
    "OutputCodec",
    "Brightness",
    "Contrast",
    "Hue",
    "Colour",
    "ImageBufferCount",
    "MaxImageBufferCount",
    "WarmupCount",
    "PreEventCount",
    "PostEventCount",
    "AlarmFrameCount",
    "RefBlendPerc",
    "AlarmRefBlendPerc",
    "TrackMotion",
    "ZoneCount",
];

/// Optional streaming/integration subsystems, each an enable flag.
const FEATURE_FLAGS: &[(&str, &str, &str)] = &[
    ("JanusEnabled", "zm_monitor_janus_enabled", "Monitor Janus streaming enabled"),
    ("Go2RTCEnabled", "zm_monitor_go2rtc_enabled", "Monitor Go2RTC streaming enabled"),
    ("RTSP2WebEnabled", "zm_monitor_rtsp2web_enabled", "Monitor RTSP2Web streaming enabled"),
    ("MQTT_Enabled", "zm_monitor_mqtt_enabled", "Monitor MQTT enabled"),
    (
        "ONVIF_Event_Listener",
        "zm_monitor_onvif_event_listener",
        "Monitor ONVIF event listener enabled",
    ),
];

/// Collect all monitor families, appending them to `families`.
///
/// The monitor list is always force-refetched so configuration changes show
/// up on the next scrape. Returns the id→name map for this cycle, which the
/// shared-memory collector consumes. A list or daemon-status fetch failure
/// is fatal; a malformed status line is logged and skipped.
pub async fn collect_monitors<B: Backend>(
    api: &B,
    now: NaiveDateTime,
    families: &mut Vec<MetricFamily>,
) -> Result<BTreeMap<u32, String>, CollectError> {
    tracing::debug!("querying monitors");
    let monitors = api.list_monitors(true).await?;
    tracing::debug!(count = monitors.len(), "monitors fetched");

    let mut info = MetricFamily::info("zm_monitor", "Information about a monitor");
    let mut zmc_uptime = MetricFamily::gauge(
        "zm_monitor_zmc_uptime_seconds",
        "Uptime of monitor zmc process in seconds",
    );
    let mut zmc_pid = MetricFamily::gauge("zm_monitor_zmc_pid", "Monitor zmc process PID");
    let mut status = MetricFamily::gauge("zm_monitor_status", "Monitor status");
    let mut enabled = MetricFamily::gauge("zm_monitor_enabled", "Monitor is enabled");
    let mut function = LabeledStateSet::new("zm_monitor_function", "Monitor function");
    let mut capturing = LabeledStateSet::new("zm_monitor_capturing", "Monitor capturing mode");
    let mut analysing = LabeledStateSet::new("zm_monitor_analysing", "Monitor analysing mode");
    let mut recording = LabeledStateSet::new("zm_monitor_recording", "Monitor recording mode");
    let mut decoding = LabeledStateSet::new("zm_monitor_decoding", "Monitor decoding mode");
    let mut flags: Vec<MetricFamily> = FEATURE_FLAGS
        .iter()
        .map(|(_, name, help)| MetricFamily::gauge(name, help))
        .collect();
    let mut int_metrics: Vec<MetricFamily> = INT_FIELDS
        .iter()
        .map(|f| {
            MetricFamily::gauge(
                &format!("zm_monitor_{}", camel_to_snake(f)),
                &format!("ZM Monitor {f}"),
            )
        })
        .collect();
    let mut connected = MetricFamily::gauge("zm_monitor_connected", "Monitor is connected or not");
    let mut capture_fps = MetricFamily::gauge("zm_monitor_capture_fps", "Monitor capture FPS");
    let mut analysis_fps = MetricFamily::gauge("zm_monitor_analysis_fps", "Monitor analysis FPS");
    let mut capture_bw = MetricFamily::gauge(
        "zm_monitor_capture_bandwidth_bytes_per_second",
        "Monitor capture bandwidth",
    );
    let mut event_count = MetricFamily::gauge("zm_monitor_event_count", "Monitor event count");
    let mut event_disk_space = MetricFamily::gauge(
        "zm_monitor_event_disk_space_bytes",
        "Monitor event disk space",
    );
    let mut archived_event_count = MetricFamily::gauge(
        "zm_monitor_archived_event_count",
        "Monitor archived event count",
    );
    let mut archived_event_disk_space = MetricFamily::gauge(
        "zm_monitor_archived_event_disk_space_bytes",
        "Monitor archived event disk space",
    );

    let mut id_to_name: BTreeMap<u32, String> = BTreeMap::new();

    for entry in &monitors {
        let rec = &entry.monitor;
        let id = rec.id.to_string();
        let labels: Vec<(&str, &str)> = vec![("id", id.as_str()), ("name", rec.name.as_str())];
        id_to_name.insert(rec.id, rec.name.clone());

        // Identity info sample.
        let mut info_vals: Vec<(String, String)> = INFO_FIELDS
            .iter()
            .map(|f| (camel_to_snake(f), field_display(rec, f)))
            .collect();
        info_vals.push(("capturing".into(), rec.capturing.clone().unwrap_or_default()));
        info_vals.push(("analysing".into(), rec.analysing.clone().unwrap_or_default()));
        info_vals.push(("recording".into(), rec.recording.clone().unwrap_or_default()));
        info_vals.push(("decoding".into(), rec.decoding.clone().unwrap_or_default()));
        info_vals.push((
            "output_codec_name".into(),
            field_display(rec, "OutputCodecName"),
        ));
        let mut info_labels: Vec<(&str, &str)> = info_vals
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        info_labels.extend_from_slice(&labels);
        info.add(&info_labels, 1.0);

        // zmc daemon status, plus the parsed uptime/pid when the status text
        // describes a running process.
        let daemon = api.daemon_status(rec.id).await?;
        status.add(&labels, if daemon.status { 1.0 } else { 0.0 });
        match parse_status_line(&daemon.statustext, now) {
            Ok(Some(proc)) => {
                let mut with_cmd = labels.clone();
                with_cmd.push(("command", proc.command.as_str()));
                zmc_uptime.add(&with_cmd, proc.age_seconds);
                zmc_pid.add(&with_cmd, proc.pid as f64);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    monitor_id = rec.id,
                    monitor = %rec.name,
                    statustext = %daemon.statustext,
                    error = %e,
                    "error parsing monitor status string"
                );
            }
        }

        enabled.add(&labels, monitor_enabled(rec));

        function.add(
            &labels,
            rec.function.as_deref().unwrap_or("Unknown"),
            FUNCTION_STATES,
        );
        capturing.add(
            &labels,
            rec.capturing.as_deref().unwrap_or("Unknown"),
            CAPTURING_STATES,
        );
        analysing.add(
            &labels,
            rec.analysing.as_deref().unwrap_or("Unknown"),
            ANALYSING_STATES,
        );
        recording.add(
            &labels,
            rec.recording.as_deref().unwrap_or("Unknown"),
            RECORDING_STATES,
        );
        decoding.add(
            &labels,
            rec.decoding.as_deref().unwrap_or("Unknown"),
            DECODING_STATES,
        );

        for (i, (field, _, _)) in FEATURE_FLAGS.iter().enumerate() {
            flags[i].add(&labels, field_flag(rec, field));
        }
        for (i, field) in INT_FIELDS.iter().enumerate() {
            int_metrics[i].add(&labels, field_num(rec, field));
        }

        let live = &entry.status;
        if live.status != "Connected" {
            tracing::warn!(monitor = %rec.name, status = %live.status, "monitor is not connected");
        }
        let mut with_status = labels.clone();
        with_status.push(("status", live.status.as_str()));
        connected.add(&with_status, if live.status == "Connected" { 1.0 } else { 0.0 });
        capture_fps.add(&labels, live.capture_fps);
        analysis_fps.add(&labels, live.analysis_fps);
        capture_bw.add(&labels, live.capture_bandwidth);

        let events = &entry.events;
        event_count.add(&labels, events.total_events.unwrap_or(0.0));
        event_disk_space.add(&labels, events.total_event_disk_space.unwrap_or(0.0));
        archived_event_count.add(&labels, events.archived_events.unwrap_or(0.0));
        archived_event_disk_space.add(&labels, events.archived_event_disk_space.unwrap_or(0.0));
    }

    families.push(info);
    families.push(status);
    families.push(event_count);
    families.push(enabled);
    families.push(function.into_family());
    families.push(capturing.into_family());
    families.push(analysing.into_family());
    families.push(recording.into_family());
    families.push(decoding.into_family());
    families.extend(flags);
    families.push(connected);
    families.push(capture_fps);
    families.push(analysis_fps);
    families.push(capture_bw);
    families.push(event_disk_space);
    families.push(archived_event_count);
    families.push(archived_event_disk_space);
    families.push(zmc_uptime);
    families.push(zmc_pid);
    families.extend(int_metrics);

    Ok(id_to_name)
}
