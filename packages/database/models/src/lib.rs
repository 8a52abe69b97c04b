#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident store row types and query parameter definitions.
//!
//! These types describe what the aggregation and listing queries take and
//! return. They are shared by the `PostGIS` store and the in-memory store
//! so both produce identical results for identical inputs, and are
//! distinct from the API response types in `traffic_map_server_models`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use traffic_map_dataset_models::Dataset;
use traffic_map_spatial::SpatialPredicate;

/// Half-open date range `[start, end)` in local (naive) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First included day.
    pub start: NaiveDate,
    /// First excluded day.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Midnight at the start of the range (inclusive bound).
    #[must_use]
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    /// Midnight at the end of the range (exclusive bound).
    #[must_use]
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.end.and_time(chrono::NaiveTime::MIN)
    }

    /// Whether `ts` falls in `[start, end)`.
    #[must_use]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start_datetime() <= ts && ts < self.end_datetime()
    }
}

/// Attribute filters shared by aggregation and listing queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentFilter {
    /// Timestamp range.
    pub date_range: DateRange,
    /// Exact value of the dataset's category column (street name or
    /// intersection). Ignored for datasets without one.
    pub category: Option<String>,
}

/// Parameters for a spatial aggregation query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    /// Dataset to aggregate.
    pub dataset: Dataset,
    /// Search region.
    pub predicate: SpatialPredicate,
    /// Grid cell edge length in degrees. Only used for bounding-box
    /// predicates; buffer predicates group by buffer.
    pub cell_size: f64,
    /// Attribute filters.
    pub filter: IncidentFilter,
}

/// One aggregated cell or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    /// Snapped cell longitude, or buffer center longitude.
    pub longitude: f64,
    /// Snapped cell latitude, or buffer center latitude.
    pub latitude: f64,
    /// Exact number of matching incidents.
    pub count: u64,
}

/// A page request for listings. `index` is zero-based and counted in
/// pages; the row offset is `index * size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Rows per page.
    pub size: u32,
    /// Zero-based page number.
    pub index: u32,
}

impl Page {
    /// Number of rows skipped before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }
}

/// Parameters for a paginated listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// Dataset to list.
    pub dataset: Dataset,
    /// Attribute filters.
    pub filter: IncidentFilter,
    /// Requested page.
    pub page: Page,
}

/// A page of listing rows plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePage {
    /// Rows on this page, newest first.
    pub rows: Vec<IncidentRow>,
    /// Total rows matching the filter.
    pub total: u64,
}

/// A distinct filter value (street name or intersection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    /// 1-based position in the sorted list.
    pub id: u32,
    /// The value.
    pub name: String,
}

/// Listing projection of an incident, one variant per dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncidentRow {
    /// A traffic crash.
    Crash(CrashRow),
    /// A speed camera daily violation total.
    SpeedViolation(SpeedViolationRow),
    /// A red light camera daily violation total.
    RedLightViolation(RedLightViolationRow),
}

/// Crash listing columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRow {
    /// Source record ID.
    pub crash_record_id: String,
    /// When the crash happened.
    pub crash_date: NaiveDateTime,
    /// Street the crash was reported on.
    pub street_name: Option<String>,
    /// First collision type (e.g. `REAR END`).
    pub crash_type: Option<String>,
    /// Weather at the time of the crash.
    pub weather_condition: Option<String>,
    /// Lighting at the time of the crash.
    pub lighting_condition: Option<String>,
    /// Total injuries.
    pub injuries_total: Option<i32>,
}

/// Speed camera listing columns.
///
/// Rejects unknown fields so untagged [`IncidentRow`] deserialization
/// does not swallow red light rows (which add `intersection`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedViolationRow {
    /// Camera identifier.
    pub camera_id: String,
    /// Camera address.
    pub address: Option<String>,
    /// Day of the violations.
    pub violation_date: NaiveDateTime,
    /// Violations recorded that day.
    pub violations: i32,
}

/// Red light camera listing columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedLightViolationRow {
    /// Camera identifier.
    pub camera_id: String,
    /// Intersection the camera watches.
    pub intersection: Option<String>,
    /// Camera address.
    pub address: Option<String>,
    /// Day of the violations.
    pub violation_date: NaiveDateTime,
    /// Violations recorded that day.
    pub violations: i32,
}

impl IncidentRow {
    /// Dataset this row belongs to.
    #[must_use]
    pub const fn dataset(&self) -> Dataset {
        match self {
            Self::Crash(_) => Dataset::Crashes,
            Self::SpeedViolation(_) => Dataset::Speeds,
            Self::RedLightViolation(_) => Dataset::Redlights,
        }
    }

    /// Event timestamp.
    #[must_use]
    pub const fn occurred_at(&self) -> NaiveDateTime {
        match self {
            Self::Crash(r) => r.crash_date,
            Self::SpeedViolation(r) => r.violation_date,
            Self::RedLightViolation(r) => r.violation_date,
        }
    }

    /// Value of the dataset's category column, if it has one.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Crash(r) => r.street_name.as_deref(),
            Self::RedLightViolation(r) => r.intersection.as_deref(),
            Self::SpeedViolation(_) => None,
        }
    }

    /// Natural key used as the ordering tie-breaker.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Crash(r) => &r.crash_record_id,
            Self::SpeedViolation(r) => &r.camera_id,
            Self::RedLightViolation(r) => &r.camera_id,
        }
    }
}

/// A located incident, as held by the incident store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Listing attributes.
    pub row: IncidentRow,
}

impl IncidentRecord {
    /// Whether the record passes the attribute filter.
    #[must_use]
    pub fn matches(&self, filter: &IncidentFilter) -> bool {
        if !filter.date_range.contains(self.row.occurred_at()) {
            return false;
        }
        let has_category_column = self
            .row
            .dataset()
            .schema()
            .is_some_and(|s| s.category_column.is_some());
        match (&filter.category, has_category_column) {
            (Some(wanted), true) => self.row.category() == Some(wanted.as_str()),
            _ => true,
        }
    }
}
