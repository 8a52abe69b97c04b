//! Zoom-keyed grid sizing and snap-to-grid.
//!
//! The map frontend requests aggregated counts per grid cell. The cell
//! edge length depends only on the zoom level, so the same zoom always
//! produces the same cell boundaries.

/// Ascending `(max_zoom, cell_size_degrees)` breakpoints.
const ZOOM_BREAKPOINTS: &[(f64, f64)] = &[
    (4.0, 0.5),
    (6.0, 0.25),
    (7.0, 0.125),
    (8.0, 0.06),
    (10.0, 0.03),
    (11.0, 0.015),
    (12.0, 0.008),
    (13.0, 0.004),
    (14.0, 0.002),
    (15.0, 0.000_015),
];

/// Cell size used past the last breakpoint.
pub const FINEST_CELL_SIZE: f64 = 0.000_015;

/// Returns the grid-cell edge length (degrees) for a map zoom level.
///
/// Picks the first breakpoint whose max zoom is at or above `zoom`.
/// Zooms past every breakpoint (and `NaN`) get [`FINEST_CELL_SIZE`].
#[must_use]
pub fn cell_size_for_zoom(zoom: f64) -> f64 {
    ZOOM_BREAKPOINTS
        .iter()
        .find(|(max_zoom, _)| zoom <= *max_zoom)
        .map_or(FINEST_CELL_SIZE, |(_, size)| *size)
}

/// Rounds `value` to the nearest multiple of `cell_size`.
///
/// Ties round to even, matching `PostGIS` `ST_SnapToGrid`. A non-positive
/// or non-finite cell size leaves the value untouched.
#[must_use]
pub fn snap(value: f64, cell_size: f64) -> f64 {
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return value;
    }
    (value / cell_size).round_ties_even() * cell_size
}

/// Snaps a `(longitude, latitude)` pair onto the grid.
#[must_use]
pub fn snap_point(longitude: f64, latitude: f64, cell_size: f64) -> (f64, f64) {
    (snap(longitude, cell_size), snap(latitude, cell_size))
}
