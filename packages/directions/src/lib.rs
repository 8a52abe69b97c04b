#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Driving directions for the route overlay.
//!
//! The `/navigation` endpoint asks a third-party directions provider for
//! alternative driving routes between waypoints, then counts crashes near
//! every maneuver point along those routes. This crate holds:
//!
//! - the provider response model ([`DirectionsResponse`], Mapbox
//!   Directions v5 format),
//! - the [`DirectionsProvider`] seam and its [`mapbox`] implementation,
//! - [`steps`], which flattens and deduplicates maneuver points into
//!   [`RouteStep`]s ready for buffering.

pub mod mapbox;
pub mod steps;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use traffic_map_spatial::RouteStep;

/// Errors from requesting directions.
#[derive(Debug, Error)]
pub enum DirectionsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The waypoint string could not be parsed.
    #[error("Invalid coordinates: {message}")]
    InvalidCoordinates {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// The provider found no route between the waypoints.
    #[error("No route found")]
    NoRoute,

    /// The provider rejected the request.
    #[error("Directions provider error ({code}): {message}")]
    Provider {
        /// Provider status code (e.g. `"InvalidInput"`).
        code: String,
        /// Provider message.
        message: String,
    },

    /// No provider credentials are configured.
    #[error("Directions provider is not configured")]
    NotConfigured,
}

/// A source of driving routes.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Requests alternative driving routes through `waypoints`
    /// (`[longitude, latitude]`, in travel order).
    ///
    /// Implementations return [`DirectionsError::NoRoute`] rather than an
    /// empty route list.
    ///
    /// # Errors
    ///
    /// Returns [`DirectionsError`] if the provider is unreachable, rejects
    /// the request, or finds no route.
    async fn routes(&self, waypoints: &[[f64; 2]]) -> Result<Vec<Route>, DirectionsError>;
}

/// Provider used when no access token is configured. Every request fails
/// with [`DirectionsError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl DirectionsProvider for Unconfigured {
    async fn routes(&self, _waypoints: &[[f64; 2]]) -> Result<Vec<Route>, DirectionsError> {
        Err(DirectionsError::NotConfigured)
    }
}

/// Top-level directions response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsResponse {
    /// Provider status (`"Ok"`, `"NoRoute"`, `"InvalidInput"`, ...).
    pub code: String,
    /// Error detail for non-`Ok` codes.
    #[serde(default)]
    pub message: Option<String>,
    /// Alternative routes, best first.
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl DirectionsResponse {
    /// Unwraps the routes, mapping provider status codes to errors.
    ///
    /// # Errors
    ///
    /// Returns [`DirectionsError::NoRoute`] for `NoRoute`/`NoSegment`
    /// codes or an empty route list, and [`DirectionsError::Provider`] for
    /// any other non-`Ok` code.
    pub fn into_routes(self) -> Result<Vec<Route>, DirectionsError> {
        match self.code.as_str() {
            "Ok" if !self.routes.is_empty() => Ok(self.routes),
            "Ok" | "NoRoute" | "NoSegment" => Err(DirectionsError::NoRoute),
            _ => Err(DirectionsError::Provider {
                message: self.message.unwrap_or_default(),
                code: self.code,
            }),
        }
    }
}

/// One alternative route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Full route geometry (`LineString`).
    pub geometry: geojson::Geometry,
    /// Route length in meters.
    #[serde(default)]
    pub distance: f64,
    /// Estimated travel time in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Legs between consecutive waypoints.
    #[serde(default)]
    pub legs: Vec<Leg>,
}

/// Route section between two waypoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    /// Turn-by-turn steps.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One maneuver and the road traveled until the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Meters to the next maneuver.
    pub distance: f64,
    /// Where the maneuver happens.
    pub maneuver: Maneuver,
}

/// Maneuver location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maneuver {
    /// `[longitude, latitude]`.
    pub location: [f64; 2],
}

/// Parses the `coordinates` query parameter (`"lon,lat;lon,lat;..."`).
///
/// # Errors
///
/// Returns [`DirectionsError::InvalidCoordinates`] if fewer than two
/// waypoints are given, a pair is malformed, or a value is non-finite or
/// out of WGS84 range.
pub fn parse_waypoints(s: &str) -> Result<Vec<[f64; 2]>, DirectionsError> {
    let invalid = |message: String| DirectionsError::InvalidCoordinates { message };

    let waypoints = s
        .split(';')
        .map(|pair| {
            let parts: Vec<f64> = pair
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| invalid(format!("'{pair}': {e}")))?;
            let [lon, lat] = parts[..] else {
                return Err(invalid(format!("'{pair}' is not a lon,lat pair")));
            };
            if !(lon.is_finite() && (-180.0..=180.0).contains(&lon))
                || !(lat.is_finite() && (-90.0..=90.0).contains(&lat))
            {
                return Err(invalid(format!("'{pair}' is outside WGS84 bounds")));
            }
            Ok([lon, lat])
        })
        .collect::<Result<Vec<_>, _>>()?;

    if waypoints.len() < 2 {
        return Err(invalid(format!(
            "need at least 2 waypoints, got {}",
            waypoints.len()
        )));
    }

    Ok(waypoints)
}
