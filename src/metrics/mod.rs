//! Metric data model and text exposition.
//!
//! The Prometheus client primitives are single-valued per process; everything
//! this exporter emits needs per-monitor labels, so families here carry an
//! explicit sample list and are rebuilt from scratch on every scrape.

use std::collections::BTreeMap;
use std::fmt::Write;

/// One exposition sample: a label set and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    Gauge,
    /// Renders as `<name>_info{...} 1`.
    Info,
}

/// A named metric family with repeated labeled samples.
///
/// Duplicate label sets are permitted; each `add` appends one sample.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: FamilyKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn gauge(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            kind: FamilyKind::Gauge,
            samples: Vec::new(),
        }
    }

    /// Gauge whose name carries a unit suffix, unless already present.
    pub fn gauge_with_unit(name: &str, help: &str, unit: &str) -> Self {
        let name = if unit.is_empty() || name.ends_with(&format!("_{unit}")) {
            name.to_string()
        } else {
            format!("{name}_{unit}")
        };
        Self {
            name,
            help: help.to_string(),
            kind: FamilyKind::Gauge,
            samples: Vec::new(),
        }
    }

    pub fn info(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            kind: FamilyKind::Info,
            samples: Vec::new(),
        }
    }

    /// Append one sample with the given labels.
    pub fn add(&mut self, labels: &[(&str, &str)], value: f64) {
        self.samples.push(Sample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        });
    }
}

/// A family of mutually exclusive enumerated states.
///
/// Each `add` expands into one 0/1 sample per state, the state name carried
/// in a label keyed by the family name, sorted for deterministic output.
#[derive(Debug, Clone)]
pub struct LabeledStateSet {
    family: MetricFamily,
}

impl LabeledStateSet {
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            family: MetricFamily::gauge(name, help),
        }
    }

    /// Record which of `states` is currently active for one label set.
    ///
    /// An active value missing from the declared states is still emitted as
    /// an extra state rather than dropped, and logged as an error.
    pub fn add(&mut self, labels: &[(&str, &str)], active: &str, states: &[&str]) {
        let mut all: Vec<&str> = states.to_vec();
        if !all.contains(&active) {
            tracing::error!(
                metric = %self.family.name,
                value = %active,
                ?states,
                "observed state not listed in declared state set"
            );
            all.push(active);
        }
        all.sort_unstable();
        let name = self.family.name.clone();
        for state in all {
            let mut with_state: Vec<(&str, &str)> = labels.to_vec();
            with_state.push((name.as_str(), state));
            self.family
                .add(&with_state, if state == active { 1.0 } else { 0.0 });
        }
    }

    pub fn into_family(self) -> MetricFamily {
        self.family
    }
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Render families in the Prometheus text exposition format (version 0.0.4).
pub fn render(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for fam in families {
        let sample_name = match fam.kind {
            FamilyKind::Gauge => fam.name.clone(),
            FamilyKind::Info => format!("{}_info", fam.name),
        };
        let _ = writeln!(out, "# HELP {} {}", sample_name, fam.help);
        let _ = writeln!(out, "# TYPE {} gauge", sample_name);
        for s in &fam.samples {
            if s.labels.is_empty() {
                let _ = writeln!(out, "{} {}", sample_name, format_value(s.value));
            } else {
                let labels = s
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = writeln!(out, "{}{{{}}} {}", sample_name, labels, format_value(s.value));
            }
        }
    }
    out
}
