//! Telemetry snapshot and metric value types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single metric value.
///
/// Snapshots are loosely typed: most metrics are preformatted strings
/// (`"42.3%"`, `"16 GiB"`), counters are integers, load averages are
/// floats, and multi-valued metrics (per-core CPU usage) nest one level.
/// The untagged representation keeps the wire format a plain JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Nested(BTreeMap<String, MetricValue>),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        // Counters far beyond i64::MAX do not occur in practice; saturate
        // rather than wrap if one ever does.
        MetricValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::from(v as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<BTreeMap<String, MetricValue>> for MetricValue {
    fn from(v: BTreeMap<String, MetricValue>) -> Self {
        MetricValue::Nested(v)
    }
}

/// One telemetry snapshot: a flat, ordered metric-name-to-value map.
///
/// Produced fresh on each sampling tick, serialized immediately, then
/// discarded. `BTreeMap` keeps serialization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot {
    metrics: BTreeMap<String, MetricValue>,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a metric, replacing any previous value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.metrics.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricValue)> {
        self.metrics.iter()
    }

    /// Serializes the snapshot to its wire frame (one flat JSON object).
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a wire frame back into a snapshot.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_flat() {
        let mut snap = TelemetrySnapshot::new();
        snap.insert("cpu_usage", "12.3%");
        snap.insert("process_count", 100i64);
        snap.insert("load_1", 0.5);

        let frame = snap.to_frame().unwrap();
        // No envelope: the frame is the metric map itself.
        assert_eq!(
            frame,
            r#"{"cpu_usage":"12.3%","load_1":0.5,"process_count":100}"#
        );
    }

    #[test]
    fn snapshot_round_trips() {
        let mut cores = BTreeMap::new();
        cores.insert("cpu_core_0".to_string(), MetricValue::from("55.21"));
        cores.insert("cpu_core_1".to_string(), MetricValue::from("48.02"));

        let mut snap = TelemetrySnapshot::new();
        snap.insert("hostname", "unit-test-host");
        snap.insert("cpu_cores", cores);
        snap.insert("bytes_sent", 1024u64);

        let parsed = TelemetrySnapshot::from_frame(&snap.to_frame().unwrap()).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let frame = r#"{"a":"text","b":7,"c":1.25,"d":{"x":"1"}}"#;
        let snap = TelemetrySnapshot::from_frame(frame).unwrap();

        assert_eq!(snap.get("a"), Some(&MetricValue::Text("text".into())));
        assert_eq!(snap.get("b"), Some(&MetricValue::Integer(7)));
        assert_eq!(snap.get("c"), Some(&MetricValue::Float(1.25)));
        assert!(matches!(snap.get("d"), Some(MetricValue::Nested(m)) if m.len() == 1));
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut a = TelemetrySnapshot::new();
        a.insert("z_last", 1i64);
        a.insert("a_first", 2i64);

        let mut b = TelemetrySnapshot::new();
        b.insert("a_first", 2i64);
        b.insert("z_last", 1i64);

        assert_eq!(a.to_frame().unwrap(), b.to_frame().unwrap());
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut snap = TelemetrySnapshot::new();
        snap.insert("cpu_usage", "10.0%");
        snap.insert("cpu_usage", "20.0%");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("cpu_usage"), Some(&MetricValue::Text("20.0%".into())));
    }

    #[test]
    fn oversized_counter_saturates() {
        let v = MetricValue::from(u64::MAX);
        assert_eq!(v, MetricValue::Integer(i64::MAX));
    }
}
