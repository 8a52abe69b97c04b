//! Static cluster fixtures in the City of Chicago export format.
//!
//! Each fixture is a JSON array of objects keyed by upper-case column
//! names. Numeric columns arrive either as numbers or as strings. Rows
//! without usable coordinates are skipped with a warning.

use std::path::Path;

use geojson::{FeatureCollection, JsonObject, JsonValue};
use serde_json::json;
use traffic_map_dataset_models::Dataset;

use crate::cluster::{ClusterAccumulator, ClusterRow};
use crate::{FixtureError, feature_collection, point_feature};

/// Speed camera violations export.
pub const SPEED_FILE: &str = "speed.json";
/// Red light camera violations export.
pub const REDLIGHT_FILE: &str = "redlight.json";
/// Congestion estimates by segment export.
pub const CONGESTION_FILE: &str = "congestion.json";

/// Pre-computed cluster feature collections, built once at start-up.
#[derive(Debug, Clone)]
pub struct ClusterFixtures {
    speeds: FeatureCollection,
    redlights: FeatureCollection,
    congestions: FeatureCollection,
}

impl Default for ClusterFixtures {
    fn default() -> Self {
        Self {
            speeds: feature_collection(Vec::new()),
            redlights: feature_collection(Vec::new()),
            congestions: feature_collection(Vec::new()),
        }
    }
}

impl ClusterFixtures {
    /// Loads every fixture from `dir`. Missing files produce empty
    /// collections.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] if a present file cannot be read or is not
    /// a JSON array of objects.
    pub fn load(dir: &Path) -> Result<Self, FixtureError> {
        let fixtures = Self::from_rows(
            &read_rows(&dir.join(SPEED_FILE))?,
            &read_rows(&dir.join(REDLIGHT_FILE))?,
            &read_rows(&dir.join(CONGESTION_FILE))?,
        );
        log::info!(
            "Loaded cluster fixtures from {}: {} speed cameras, {} red light cameras, {} congestion segments",
            dir.display(),
            fixtures.speeds.features.len(),
            fixtures.redlights.features.len(),
            fixtures.congestions.features.len(),
        );
        Ok(fixtures)
    }

    /// Builds the collections from already parsed rows.
    #[must_use]
    pub fn from_rows(
        speed_rows: &[JsonObject],
        redlight_rows: &[JsonObject],
        congestion_rows: &[JsonObject],
    ) -> Self {
        Self {
            speeds: camera_clusters(speed_rows, &[("ADDRESS", "address")]),
            redlights: camera_clusters(
                redlight_rows,
                &[("ADDRESS", "address"), ("INTERSECTION", "intersection")],
            ),
            congestions: congestion_segments(congestion_rows),
        }
    }

    /// The cluster collection for `dataset`, if it has a fixture.
    #[must_use]
    pub const fn get(&self, dataset: Dataset) -> Option<&FeatureCollection> {
        match dataset {
            Dataset::Speeds => Some(&self.speeds),
            Dataset::Redlights => Some(&self.redlights),
            Dataset::Congestions => Some(&self.congestions),
            Dataset::Crashes => None,
        }
    }
}

fn read_rows(path: &Path) -> Result<Vec<JsonObject>, FixtureError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Fixture {} not found, serving an empty cluster", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(FixtureError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    serde_json::from_str(&contents).map_err(|source| FixtureError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Reads a numeric column that may be encoded as a number or a string.
fn number(row: &JsonObject, column: &str) -> Option<f64> {
    let value = match row.get(column)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v: &f64| v.is_finite())
}

/// Reads an identifier column as text.
fn text(row: &JsonObject, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coordinates(row: &JsonObject, lon: &str, lat: &str) -> Option<(f64, f64)> {
    Some((number(row, lon)?, number(row, lat)?))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn violations(row: &JsonObject) -> u64 {
    number(row, "VIOLATIONS").map_or(0, |v| v.max(0.0).round() as u64)
}

/// Copies the `(column, property)` pairs present in the row; absent
/// columns are left out.
fn pass_through(row: &JsonObject, columns: &[(&str, &str)]) -> JsonObject {
    columns
        .iter()
        .filter_map(|(column, name)| Some(((*name).to_string(), row.get(*column)?.clone())))
        .collect()
}

/// Merges camera rows by `CAMERA ID`.
fn camera_clusters(rows: &[JsonObject], attributes: &[(&str, &str)]) -> FeatureCollection {
    let mut acc = ClusterAccumulator::new();

    for (i, row) in rows.iter().enumerate() {
        let Some(key) = text(row, "CAMERA ID") else {
            log::warn!("Skipping fixture row {i}: missing CAMERA ID");
            continue;
        };
        let Some((longitude, latitude)) = coordinates(row, "LONGITUDE", "LATITUDE") else {
            log::warn!("Skipping fixture row {i} ({key}): unusable coordinates");
            continue;
        };

        acc.push(ClusterRow {
            key,
            longitude,
            latitude,
            attributes: pass_through(row, attributes),
            violations: violations(row),
        });
    }

    acc.into_feature_collection()
}

/// One feature per segment at the midpoint of its endpoints.
fn congestion_segments(rows: &[JsonObject]) -> FeatureCollection {
    const PASS_THROUGH: &[(&str, &str)] = &[
        ("SEGMENTID", "segmentId"),
        ("STREET", "street"),
        ("DIRECTION", "direction"),
        ("FROM_STREET", "fromStreet"),
        ("TO_STREET", "toStreet"),
        ("LENGTH", "length"),
        ("STREET_HEADING", "streetHeading"),
    ];

    let features = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let start = coordinates(row, "START_LONGITUDE", "START_LATITUDE");
            let end = coordinates(row, "END_LONGITUDE", "END_LATITUDE");
            let (Some((x1, y1)), Some((x2, y2))) = (start, end) else {
                log::warn!("Skipping congestion row {i}: unusable segment endpoints");
                return None;
            };

            let mut properties = pass_through(row, PASS_THROUGH);
            properties.insert("count".to_string(), json!(1));

            Some(point_feature(
                f64::midpoint(x1, x2),
                f64::midpoint(y1, y2),
                properties,
            ))
        })
        .collect();

    feature_collection(features)
}
