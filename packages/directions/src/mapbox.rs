//! Mapbox Directions API client.
//!
//! Requests the `driving` profile with alternatives, turn-by-turn steps,
//! and full-resolution `GeoJSON` geometry.
//!
//! See <https://docs.mapbox.com/api/navigation/directions/>

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{DirectionsError, DirectionsProvider, DirectionsResponse, Route};

/// Default Directions API endpoint for the driving profile.
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/directions/v5/mapbox/driving";

/// Per-request timeout for the directions call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mapbox-backed [`DirectionsProvider`].
pub struct MapboxDirections {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MapboxDirections {
    /// Creates a client for `base_url` authenticated with `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectionsError::Http`] if the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, DirectionsError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// Request URL (without query string) for the given waypoints.
    #[must_use]
    pub fn request_url(&self, waypoints: &[[f64; 2]]) -> String {
        let mut url = format!("{}/", self.base_url);
        for (i, [lon, lat]) in waypoints.iter().enumerate() {
            if i > 0 {
                url.push(';');
            }
            write!(url, "{lon},{lat}").unwrap();
        }
        url
    }
}

#[async_trait]
impl DirectionsProvider for MapboxDirections {
    async fn routes(&self, waypoints: &[[f64; 2]]) -> Result<Vec<Route>, DirectionsError> {
        let url = self.request_url(waypoints);
        log::debug!("Requesting directions: {url}");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("geometries", "geojson"),
                ("alternatives", "true"),
                ("steps", "true"),
                ("overview", "full"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        let routes = parse_response(status, body)?;

        log::debug!("Directions returned {} route(s)", routes.len());
        Ok(routes)
    }
}

/// Parses a Directions API response body.
///
/// Non-success HTTP responses without a recognizable body (e.g. an invalid
/// token) are reported as [`DirectionsError::Provider`] with the HTTP
/// status as the code.
fn parse_response(
    status: StatusCode,
    body: serde_json::Value,
) -> Result<Vec<Route>, DirectionsError> {
    match serde_json::from_value::<DirectionsResponse>(body.clone()) {
        Ok(response) => response.into_routes(),
        Err(_) if !status.is_success() => Err(DirectionsError::Provider {
            code: status.as_str().to_string(),
            message: body["message"].as_str().unwrap_or_default().to_string(),
        }),
        Err(e) => Err(DirectionsError::Parse {
            message: format!("Unexpected directions response: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(lon: f64, lat: f64, distance: f64) -> serde_json::Value {
        serde_json::json!({
            "distance": distance,
            "duration": 10.0,
            "name": "",
            "maneuver": { "location": [lon, lat], "type": "turn" }
        })
    }

    #[test]
    fn builds_request_url() {
        let client = MapboxDirections::new("https://example.test/driving/", "token").unwrap();
        let url = client.request_url(&[[-87.6298, 41.8781], [-87.6244, 41.8827]]);
        assert_eq!(url, "https://example.test/driving/-87.6298,41.8781;-87.6244,41.8827");
    }

    #[test]
    fn parses_routes_with_steps() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [{
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-87.6298, 41.8781], [-87.6244, 41.8827]]
                },
                "distance": 812.4,
                "duration": 140.2,
                "weight": 150.0,
                "legs": [{
                    "summary": "",
                    "steps": [step(-87.6298, 41.8781, 400.0), step(-87.6244, 41.8827, 0.0)]
                }]
            }],
            "waypoints": []
        });

        let routes = parse_response(StatusCode::OK, body).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].legs[0].steps.len(), 2);
        assert_eq!(routes[0].legs[0].steps[0].maneuver.location, [-87.6298, 41.8781]);
        assert!(matches!(
            routes[0].geometry.value,
            geojson::Value::LineString(_)
        ));
    }

    #[test]
    fn unauthorized_is_provider_error() {
        let body = serde_json::json!({ "message": "Not Authorized - Invalid Token" });
        match parse_response(StatusCode::UNAUTHORIZED, body) {
            Err(DirectionsError::Provider { code, message }) => {
                assert_eq!(code, "401");
                assert_eq!(message, "Not Authorized - Invalid Token");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_success_body_is_parse_error() {
        let body = serde_json::json!({ "unexpected": true });
        assert!(matches!(
            parse_response(StatusCode::OK, body),
            Err(DirectionsError::Parse { .. })
        ));
    }
}
