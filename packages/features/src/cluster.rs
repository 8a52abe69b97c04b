//! Identity-keyed accumulation for cluster endpoints.
//!
//! Rows sharing a key merge into one feature. The first row for a key
//! fixes the feature's position, location, and static attributes; later
//! rows only add their violations. Output order is first-occurrence order.

use std::collections::BTreeMap;

use geojson::{FeatureCollection, JsonObject};
use serde_json::json;

use crate::{feature_collection, point_feature};

/// One source row contributing to a cluster feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRow {
    /// Natural key (camera id).
    pub key: String,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Pass-through attributes, taken from the first row of each key.
    pub attributes: JsonObject,
    /// Violations recorded by this row.
    pub violations: u64,
}

#[derive(Debug)]
struct Accumulator {
    key: String,
    longitude: f64,
    latitude: f64,
    attributes: JsonObject,
    violations: u64,
}

/// Insertion-ordered accumulation of rows keyed by identity.
#[derive(Debug, Default)]
pub struct ClusterAccumulator {
    entries: Vec<Accumulator>,
    index: BTreeMap<String, usize>,
}

impl ClusterAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row, merging it into an existing entry with the same key.
    pub fn push(&mut self, row: ClusterRow) {
        if let Some(&i) = self.index.get(&row.key) {
            self.entries[i].violations += row.violations;
            return;
        }
        self.index.insert(row.key.clone(), self.entries.len());
        self.entries.push(Accumulator {
            key: row.key,
            longitude: row.longitude,
            latitude: row.latitude,
            attributes: row.attributes,
            violations: row.violations,
        });
    }

    /// Emits one feature per key.
    ///
    /// Properties are `cameraId`, the pass-through attributes, and the
    /// summed `violations` (also as `count`).
    #[must_use]
    pub fn into_feature_collection(self) -> FeatureCollection {
        feature_collection(
            self.entries
                .into_iter()
                .map(|entry| {
                    let mut properties = JsonObject::new();
                    properties.insert("cameraId".to_string(), json!(entry.key));
                    properties.extend(entry.attributes);
                    properties.insert("violations".to_string(), json!(entry.violations));
                    properties.insert("count".to_string(), json!(entry.violations));
                    point_feature(entry.longitude, entry.latitude, properties)
                })
                .collect(),
        )
    }
}

impl FromIterator<ClusterRow> for ClusterAccumulator {
    fn from_iter<T: IntoIterator<Item = ClusterRow>>(iter: T) -> Self {
        let mut acc = Self::new();
        for row in iter {
            acc.push(row);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summed(acc: ClusterAccumulator) -> BTreeMap<String, u64> {
        acc.into_feature_collection()
            .features
            .iter()
            .map(|f| {
                (
                    f.property("cameraId").unwrap().as_str().unwrap().to_string(),
                    f.property("violations").unwrap().as_u64().unwrap(),
                )
            })
            .collect()
    }

    fn row(key: &str, violations: u64, address: &str) -> ClusterRow {
        let mut attributes = JsonObject::new();
        attributes.insert("address".to_string(), json!(address));
        ClusterRow {
            key: key.to_string(),
            longitude: -87.6,
            latitude: 41.8,
            attributes,
            violations,
        }
    }

    #[test]
    fn sums_violations_under_one_key() {
        let acc: ClusterAccumulator = [row("CHI003", 3, "first"), row("CHI003", 5, "second")]
            .into_iter()
            .collect();

        let collection = acc.into_feature_collection();
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.property("violations"), Some(&json!(8)));
        assert_eq!(feature.property("count"), Some(&json!(8)));
        assert_eq!(feature.property("cameraId"), Some(&json!("CHI003")));
        assert_eq!(feature.property("address"), Some(&json!("first")));
    }

    #[test]
    fn sums_do_not_depend_on_row_order() {
        let rows = vec![
            row("A", 1, "a"),
            row("B", 10, "b"),
            row("A", 2, "a"),
            row("C", 0, "c"),
            row("B", 20, "b"),
        ];
        let forward = summed(rows.clone().into_iter().collect());
        let backward = summed(rows.into_iter().rev().collect());

        assert_eq!(forward, backward);
        assert_eq!(forward["A"], 3);
        assert_eq!(forward["B"], 30);
        assert_eq!(forward["C"], 0);
        assert!(!forward.contains_key("missing"));
    }

    #[test]
    fn keeps_first_occurrence_order() {
        let acc: ClusterAccumulator = [row("B", 1, ""), row("A", 1, ""), row("B", 1, "")]
            .into_iter()
            .collect();
        let keys = acc
            .into_feature_collection()
            .features
            .iter()
            .map(|f| f.property("cameraId").cloned())
            .collect::<Vec<_>>();
        assert_eq!(keys, [Some(json!("B")), Some(json!("A"))]);
    }
}
