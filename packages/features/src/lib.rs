#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Turns aggregation rows and static fixture rows into `GeoJSON`.
//!
//! Map endpoints return one Point feature per aggregated cell or buffer
//! with a `count` property. Cluster endpoints read the static City of
//! Chicago exports in [`fixtures`] and merge rows that share a natural key
//! ([`cluster`]).

pub mod cluster;
pub mod fixtures;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use traffic_map_database_models::AggregatedRow;

pub use fixtures::ClusterFixtures;

/// Errors that can occur while loading static fixtures.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The fixture file could not be read.
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        /// Path of the fixture file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The fixture file is not a JSON array of objects.
    #[error("Failed to parse fixture {path}: {source}")]
    Json {
        /// Path of the fixture file.
        path: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },
}

/// Builds a Point feature at `[longitude, latitude]`.
#[must_use]
pub fn point_feature(longitude: f64, latitude: f64, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![longitude, latitude]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Wraps features into a collection.
#[must_use]
pub const fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Maps aggregation rows to Point features carrying `count`.
///
/// Row order is preserved.
#[must_use]
pub fn rows_to_feature_collection(rows: &[AggregatedRow]) -> FeatureCollection {
    feature_collection(
        rows.iter()
            .map(|row| {
                let mut properties = JsonObject::new();
                properties.insert("count".to_string(), json!(row.count));
                point_feature(row.longitude, row.latitude, properties)
            })
            .collect(),
    )
}
