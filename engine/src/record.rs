// === MEASUREMENT RECORDS ===
// A run produces one MeasurementRecord per benchmark. Records keep their
// metrics in insertion order so reports list them the way the step wrote them.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered metric name -> value pairs of a single benchmark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics(Vec<(String, f64)>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by the steps.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or overwrite a metric, keeping the original position on overwrite.
    pub fn insert(&mut self, name: &str, value: f64) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Metrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetricsVisitor;

        impl<'de> Visitor<'de> for MetricsVisitor {
            type Value = Metrics;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of metric name to number")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Metrics, A::Error> {
                let mut metrics = Metrics::new();
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    metrics.insert(&name, value);
                }
                Ok(metrics)
            }
        }

        deserializer.deserialize_map(MetricsVisitor)
    }
}

/// The immutable result of one benchmark execution.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub name: String,
    pub metrics: Metrics,
}

impl MeasurementRecord {
    pub fn new(name: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            name: name.into(),
            metrics,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name)
    }
}

/// Insertion-ordered collection of records, at most one per benchmark name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<MeasurementRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record. A record with the same name is replaced in place.
    pub fn insert(&mut self, record: MeasurementRecord) {
        match self.records.iter_mut().find(|r| r.name == record.name) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MeasurementRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.records.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.name, &record.metrics)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultSetVisitor;

        impl<'de> Visitor<'de> for ResultSetVisitor {
            type Value = ResultSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of benchmark name to metrics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ResultSet, A::Error> {
                let mut results = ResultSet::new();
                while let Some((name, metrics)) = access.next_entry::<String, Metrics>()? {
                    results.insert(MeasurementRecord::new(name, metrics));
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treeview(items: f64, duration: f64) -> MeasurementRecord {
        MeasurementRecord::new(
            "treeview",
            Metrics::new()
                .with("items", items)
                .with("duration", duration)
                .with("rate", items / duration),
        )
    }

    #[test]
    fn insert_replaces_same_name_in_place() {
        let mut results = ResultSet::new();
        results.insert(treeview(100.0, 0.5));
        results.insert(MeasurementRecord::new("memory", Metrics::new().with("size_mb", 10.0)));
        results.insert(treeview(200.0, 0.25));

        assert_eq!(results.len(), 2);
        assert_eq!(results.names().collect::<Vec<_>>(), vec!["treeview", "memory"]);
        assert_eq!(results.get("treeview").unwrap().metric("items"), Some(200.0));
    }

    #[test]
    fn json_keeps_insertion_order() {
        let mut results = ResultSet::new();
        results.insert(MeasurementRecord::new("widgets", Metrics::new().with("sets", 2.0)));
        results.insert(treeview(10.0, 1.0));

        let text = serde_json::to_string(&results).unwrap();
        assert_eq!(
            text,
            r#"{"widgets":{"sets":2.0},"treeview":{"items":10.0,"duration":1.0,"rate":10.0}}"#
        );
        let back: ResultSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn integer_metrics_load_as_numbers() {
        let back: ResultSet =
            serde_json::from_str(r#"{"windows":{"count":50,"total_duration":0.75}}"#).unwrap();
        let windows = back.get("windows").unwrap();
        assert_eq!(windows.metric("count"), Some(50.0));
        assert_eq!(windows.metric("total_duration"), Some(0.75));
    }
}
