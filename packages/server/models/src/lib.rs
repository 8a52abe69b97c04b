#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the traffic map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the incident store types to allow independent evolution of the API
//! contract.

use chrono::NaiveDate;
use geojson::{FeatureCollection, Geometry};
use serde::{Deserialize, Serialize};
use traffic_map_database_models::IncidentRow;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version string.
    pub version: String,
}

/// Query parameters for `GET /{dataset}/map`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapQueryParams {
    /// Grid cell edge length in degrees. Takes precedence over `zoom`.
    pub grid_size: Option<f64>,
    /// Map zoom level, resolved to a cell size when `gridSize` is absent.
    pub zoom: Option<f64>,
    /// JSON array of four `[lon, lat]` corners.
    pub bounding_box: String,
    /// First included day (`yyyy-MM-dd`).
    pub start_date: NaiveDate,
    /// First excluded day (`yyyy-MM-dd`).
    pub end_date: NaiveDate,
    /// Street name filter (crashes only).
    pub street_name: Option<String>,
    /// Intersection filter (red light cameras only).
    pub intersection: Option<String>,
}

/// Query parameters for `GET /{dataset}/table`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQueryParams {
    /// First included day (`yyyy-MM-dd`).
    pub start_date: NaiveDate,
    /// First excluded day (`yyyy-MM-dd`).
    pub end_date: NaiveDate,
    /// Rows per page.
    pub page_size: u32,
    /// Zero-based page number.
    pub page_index: u32,
    /// Street name filter (crashes only).
    pub street_name: Option<String>,
    /// Intersection filter (red light cameras only).
    pub intersection: Option<String>,
}

/// Query parameters for `GET /navigation`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationQueryParams {
    /// Waypoints as `lon,lat;lon,lat[;...]`.
    pub coordinates: String,
    /// First included day (`yyyy-MM-dd`).
    pub start_date: NaiveDate,
    /// First excluded day (`yyyy-MM-dd`).
    pub end_date: NaiveDate,
}

/// A page of listing rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResponse {
    /// Rows on this page, newest first.
    pub rows: Vec<IncidentRow>,
    /// Total rows matching the filter.
    pub total: u64,
}

/// Crash counts along candidate driving routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationResponse {
    /// One Point feature per route step buffer with at least one crash.
    pub geo_json: FeatureCollection,
    /// Geometry of each candidate route, in provider order.
    pub routes_data: Vec<Geometry>,
}
