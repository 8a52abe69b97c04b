#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Traffic dataset identifiers and table schema descriptors.
//!
//! Every endpoint of the traffic map is scoped to one of the City of
//! Chicago open datasets. This crate defines the canonical [`Dataset`]
//! enum used in URL paths and the [`DatasetSchema`] describing how each
//! dataset is laid out in the `PostGIS` database.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A City of Chicago traffic dataset.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dataset {
    /// Traffic crashes reported by CPD.
    Crashes,
    /// Automated speed camera violations.
    Speeds,
    /// Red light camera violations.
    Redlights,
    /// Congestion estimates by street segment (static snapshot only).
    Congestions,
}

impl Dataset {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Crashes,
            Self::Speeds,
            Self::Redlights,
            Self::Congestions,
        ]
    }

    /// Returns the database schema for this dataset, or `None` if the
    /// dataset is only available as a static fixture.
    #[must_use]
    pub const fn schema(self) -> Option<&'static DatasetSchema> {
        match self {
            Self::Crashes => Some(&CRASHES_SCHEMA),
            Self::Speeds => Some(&SPEEDS_SCHEMA),
            Self::Redlights => Some(&REDLIGHTS_SCHEMA),
            Self::Congestions => None,
        }
    }

    /// Name of the query parameter carrying the optional categorical
    /// filter for this dataset, if it supports one.
    #[must_use]
    pub const fn category_param(self) -> Option<&'static str> {
        match self {
            Self::Crashes => Some("streetName"),
            Self::Redlights => Some("intersection"),
            Self::Speeds | Self::Congestions => None,
        }
    }

    /// Whether the `/cluster` endpoint has a static fixture for this
    /// dataset.
    #[must_use]
    pub const fn has_cluster_fixture(self) -> bool {
        matches!(self, Self::Speeds | Self::Redlights | Self::Congestions)
    }
}

/// Table layout of a dataset in the incident store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSchema {
    /// Table name.
    pub table: &'static str,
    /// Column holding the event timestamp.
    pub timestamp_column: &'static str,
    /// Column used by the optional categorical equality filter.
    pub category_column: Option<&'static str>,
    /// Column uniquely identifying a record (or camera) for stable
    /// ordering.
    pub key_column: &'static str,
    /// `geometry(Point, 4326)` column.
    pub geometry_column: &'static str,
    /// Columns returned by table listings, in order.
    pub table_columns: &'static [&'static str],
}

const CRASHES_SCHEMA: DatasetSchema = DatasetSchema {
    table: "crashes",
    timestamp_column: "crash_date",
    category_column: Some("street_name"),
    key_column: "crash_record_id",
    geometry_column: "geom",
    table_columns: &[
        "crash_record_id",
        "crash_date",
        "street_name",
        "first_crash_type",
        "weather_condition",
        "lighting_condition",
        "injuries_total",
    ],
};

const SPEEDS_SCHEMA: DatasetSchema = DatasetSchema {
    table: "speed_cam",
    timestamp_column: "violation_date",
    category_column: None,
    key_column: "camera_id",
    geometry_column: "geom",
    table_columns: &["camera_id", "address", "violation_date", "violations"],
};

const REDLIGHTS_SCHEMA: DatasetSchema = DatasetSchema {
    table: "redlight_cam",
    timestamp_column: "violation_date",
    category_column: Some("intersection"),
    key_column: "camera_id",
    geometry_column: "geom",
    table_columns: &[
        "camera_id",
        "intersection",
        "address",
        "violation_date",
        "violations",
    ],
};
