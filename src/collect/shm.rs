//! Shared-memory collection: raw control-block fields per monitor.

use std::collections::BTreeMap;

use crate::metrics::MetricFamily;
use crate::shm::{SharedData, ShmReader};

const INT_FIELDS: &[&str] = &[
    "action",
    "audio_channels",
    "audio_frequency",
    "imagesize",
    "last_event",
    "last_frame_score",
    "last_read_index",
    "last_write_index",
    "state",
];
const BOOL_FIELDS: &[&str] = &["active", "format", "signal"];
const TS_FIELDS: &[&str] = &[
    "heartbeat_time",
    "last_read_time",
    "last_write_time",
    "startup_time",
];

fn int_value(data: &SharedData, field: &str) -> f64 {
    match field {
        "action" => data.action as f64,
        "audio_channels" => data.audio_channels as f64,
        "audio_frequency" => data.audio_frequency as f64,
        "imagesize" => data.imagesize as f64,
        "last_event" => data.last_event as f64,
        "last_frame_score" => data.last_frame_score as f64,
        "last_read_index" => data.last_read_index as f64,
        "last_write_index" => data.last_write_index as f64,
        "state" => data.state as f64,
        _ => unreachable!("unknown shared-data int field {field}"),
    }
}

fn bool_value(data: &SharedData, field: &str) -> f64 {
    let v = match field {
        "active" => data.active,
        "format" => data.format,
        "signal" => data.signal,
        _ => unreachable!("unknown shared-data bool field {field}"),
    };
    if v {
        1.0
    } else {
        0.0
    }
}

fn ts_value(data: &SharedData, field: &str) -> i64 {
    match field {
        "heartbeat_time" => data.heartbeat_time,
        "last_read_time" => data.last_read_time,
        "last_write_time" => data.last_write_time,
        "startup_time" => data.startup_time,
        _ => unreachable!("unknown shared-data timestamp field {field}"),
    }
}

/// Emit shared-memory gauges for every monitor seen this cycle.
///
/// Monitors are walked in ascending id order. A missing segment is expected
/// for disabled or never-started monitors and only warns; a decode failure
/// logs and skips that monitor. Timestamps become ages relative to `now`
/// (seconds since the epoch).
pub fn collect_shm(
    reader: &impl ShmReader,
    id_to_name: &BTreeMap<u32, String>,
    now: i64,
    families: &mut Vec<MetricFamily>,
) {
    let mut metrics: Vec<MetricFamily> = Vec::new();
    for f in INT_FIELDS.iter().chain(BOOL_FIELDS) {
        metrics.push(MetricFamily::gauge(
            &format!("zm_monitor_mmap_{f}"),
            &format!("ZM Monitor MMAP field {f}"),
        ));
    }
    for f in TS_FIELDS {
        metrics.push(MetricFamily::gauge(
            &format!("zm_monitor_mmap_{f}_age_seconds"),
            &format!("Seconds since value of ZM Monitor MMAP field {f}"),
        ));
    }

    tracing::debug!("handling monitor shared memory");
    for (&mid, mname) in id_to_name {
        if !reader.exists(mid) {
            tracing::warn!(
                monitor_id = mid,
                "shared memory segment for monitor does not exist; skipping"
            );
            continue;
        }
        tracing::debug!(monitor_id = mid, "reading shared memory");
        let data = match reader.read(mid) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(monitor_id = mid, error = %e, "error reading shared memory");
                continue;
            }
        };
        let id = mid.to_string();
        let labels: Vec<(&str, &str)> = vec![("id", id.as_str()), ("name", mname.as_str())];
        let mut idx = 0;
        for f in INT_FIELDS {
            metrics[idx].add(&labels, int_value(&data, f));
            idx += 1;
        }
        for f in BOOL_FIELDS {
            metrics[idx].add(&labels, bool_value(&data, f));
            idx += 1;
        }
        for f in TS_FIELDS {
            metrics[idx].add(&labels, (now - ts_value(&data, f)) as f64);
            idx += 1;
        }
    }
    families.extend(metrics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::ShmError;
    use std::path::PathBuf;

    struct FakeShm {
        segments: BTreeMap<u32, SharedData>,
        broken: Vec<u32>,
    }

    impl ShmReader for FakeShm {
        fn exists(&self, monitor_id: u32) -> bool {
            self.segments.contains_key(&monitor_id) || self.broken.contains(&monitor_id)
        }

        fn read(&self, monitor_id: u32) -> Result<SharedData, ShmError> {
            if self.broken.contains(&monitor_id) {
                return Err(ShmError::Truncated {
                    path: PathBuf::from(format!("zm.mmap.{monitor_id}")),
                    len: 8,
                    need: crate::shm::SHARED_DATA_LEN,
                });
            }
            Ok(self.segments[&monitor_id].clone())
        }
    }

    fn find<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn test_timestamp_fields_become_ages() {
        let now = 1_700_000_100;
        let data = SharedData {
            last_write_time: now - 5,
            heartbeat_time: now - 1,
            last_read_time: now - 6,
            startup_time: now - 3600,
            ..Default::default()
        };
        let reader = FakeShm {
            segments: [(1, data)].into_iter().collect(),
            broken: vec![],
        };
        let id_to_name = [(1, "gate".to_string())].into_iter().collect();

        let mut families = Vec::new();
        collect_shm(&reader, &id_to_name, now, &mut families);

        let ages = find(&families, "zm_monitor_mmap_last_write_time_age_seconds");
        assert_eq!(ages.samples.len(), 1);
        assert_eq!(ages.samples[0].value, 5.0);
        assert_eq!(ages.samples[0].labels["name"], "gate");
        assert_eq!(
            find(&families, "zm_monitor_mmap_startup_time_age_seconds").samples[0].value,
            3600.0
        );
    }

    #[test]
    fn test_missing_and_broken_segments_skipped() {
        let data = SharedData {
            active: true,
            signal: true,
            state: 2,
            ..Default::default()
        };
        let reader = FakeShm {
            segments: [(2, data)].into_iter().collect(),
            broken: vec![3],
        };
        let id_to_name = [
            (1, "absent".to_string()),
            (2, "ok".to_string()),
            (3, "broken".to_string()),
        ]
        .into_iter()
        .collect();

        let mut families = Vec::new();
        collect_shm(&reader, &id_to_name, 0, &mut families);

        // Families exist for all fields, but only monitor 2 produced samples.
        assert_eq!(families.len(), INT_FIELDS.len() + BOOL_FIELDS.len() + TS_FIELDS.len());
        let active = find(&families, "zm_monitor_mmap_active");
        assert_eq!(active.samples.len(), 1);
        assert_eq!(active.samples[0].labels["id"], "2");
        assert_eq!(active.samples[0].value, 1.0);
        assert_eq!(find(&families, "zm_monitor_mmap_state").samples[0].value, 2.0);
        assert_eq!(find(&families, "zm_monitor_mmap_format").samples[0].value, 0.0);
    }
}
