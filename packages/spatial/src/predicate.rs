//! Search regions for aggregation queries.
//!
//! A [`SpatialPredicate`] is either a viewport [`BoundingBox`] (four
//! corners closed into a polygon ring) or a [`BufferSet`] of geodesic
//! circles around route steps. The incident store renders the predicate
//! as `PostGIS` SQL or evaluates it in memory; both interpretations use
//! the geometry defined here.

use geo::{
    Area as _, Destination as _, Geodesic, Intersects as _, Line, LineString, Point, Polygon,
};
use serde::{Deserialize, Serialize};

use crate::SpatialError;

/// Vertices used to approximate one buffer circle (8 per quadrant, the
/// `PostGIS` `ST_Buffer` default).
pub const BUFFER_SEGMENTS: usize = 32;

/// A region to aggregate incidents over.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialPredicate {
    /// Viewport polygon.
    BoundingBox(BoundingBox),
    /// Geodesic circles around route steps.
    Buffers(BufferSet),
}

/// A four-corner viewport polygon in WGS84 `[longitude, latitude]` order.
///
/// Corners are kept in caller order; the ring is closed by repeating the
/// first corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    corners: [[f64; 2]; 4],
}

impl BoundingBox {
    /// Validates four corners as a simple polygon ring.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if there are not exactly
    /// four points, a coordinate is non-finite or out of WGS84 range, the
    /// ring has zero area, or two of its edges cross.
    pub fn from_corners(points: &[[f64; 2]]) -> Result<Self, SpatialError> {
        let corners: [[f64; 2]; 4] = points.try_into().map_err(|_| {
            SpatialError::invalid(format!(
                "bounding box needs exactly 4 points, got {}",
                points.len()
            ))
        })?;

        for [lon, lat] in corners {
            validate_coordinate(lon, lat)?;
        }

        let bbox = Self { corners };

        let edges = bbox.edges();
        if edges[0].intersects(&edges[2]) || edges[1].intersects(&edges[3]) {
            return Err(SpatialError::invalid(
                "bounding box ring is self-intersecting",
            ));
        }

        if bbox.to_polygon().unsigned_area() <= 0.0 {
            return Err(SpatialError::invalid("bounding box has zero area"));
        }

        Ok(bbox)
    }

    /// Parses the `boundingBox` query parameter: a JSON array of four
    /// `[lon, lat]` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the string is not a
    /// JSON array of coordinate pairs or the corners are invalid.
    pub fn parse_json(s: &str) -> Result<Self, SpatialError> {
        let points: Vec<[f64; 2]> = serde_json::from_str(s)
            .map_err(|e| SpatialError::invalid(format!("bounding box is not valid JSON: {e}")))?;
        Self::from_corners(&points)
    }

    /// The corners in caller order.
    #[must_use]
    pub const fn corners(&self) -> &[[f64; 2]; 4] {
        &self.corners
    }

    /// The closed polygon ring: the four corners followed by the first
    /// corner again.
    #[must_use]
    pub const fn closed_ring(&self) -> [[f64; 2]; 5] {
        let c = self.corners;
        [c[0], c[1], c[2], c[3], c[0]]
    }

    /// The ring as a [`Polygon`].
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring: Vec<(f64, f64)> = self
            .closed_ring()
            .iter()
            .map(|[lon, lat]| (*lon, *lat))
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Whether the point lies inside or on the boundary of the polygon
    /// (`ST_Intersects` semantics).
    #[must_use]
    pub fn intersects_point(&self, longitude: f64, latitude: f64) -> bool {
        self.to_polygon()
            .intersects(&Point::new(longitude, latitude))
    }

    fn edges(&self) -> [Line<f64>; 4] {
        let ring = self.closed_ring();
        std::array::from_fn(|i| {
            Line::new(
                (ring[i][0], ring[i][1]),
                (ring[i + 1][0], ring[i + 1][1]),
            )
        })
    }
}

/// A maneuver point of a driving route and the distance (meters) to the
/// next maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// `[longitude, latitude]` of the maneuver.
    pub location: [f64; 2],
    /// Meters to the next step.
    pub distance: f64,
}

impl RouteStep {
    /// Creates a new route step.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64, distance: f64) -> Self {
        Self {
            location: [longitude, latitude],
            distance,
        }
    }

    /// Bitwise identity of the `(location, distance)` triple, usable as a
    /// hash/ordering key. `-0.0` and `0.0` map to the same key.
    #[must_use]
    pub fn identity(&self) -> [u64; 3] {
        [
            (self.location[0] + 0.0).to_bits(),
            (self.location[1] + 0.0).to_bits(),
            (self.distance + 0.0).to_bits(),
        ]
    }
}

/// A geodesic circle of `radius_meters` around `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buffer {
    /// Circle center.
    pub center: Point<f64>,
    /// Radius in meters, measured on the WGS84 ellipsoid.
    pub radius_meters: f64,
}

impl Buffer {
    /// Approximates the circle as a closed polygon of
    /// [`BUFFER_SEGMENTS`] vertices, the shape `ST_Buffer` produces.
    ///
    /// A zero radius buffers to an empty region and yields `None`.
    #[must_use]
    pub fn to_polygon(&self) -> Option<Polygon<f64>> {
        if self.radius_meters <= 0.0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let step = 360.0 / BUFFER_SEGMENTS as f64;
        let mut ring: Vec<Point<f64>> = (0..BUFFER_SEGMENTS)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let bearing = i as f64 * step;
                Geodesic.destination(self.center, bearing, self.radius_meters)
            })
            .collect();
        ring.push(ring[0]);
        Some(Polygon::new(LineString::from(ring), vec![]))
    }
}

/// Buffers built from deduplicated route steps, tested together in a
/// single query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferSet {
    buffers: Vec<Buffer>,
}

impl BufferSet {
    /// Builds one buffer per step, in step order.
    ///
    /// An empty slice yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if a step location is
    /// out of range or a distance is negative or non-finite.
    pub fn from_steps(steps: &[RouteStep]) -> Result<Self, SpatialError> {
        let buffers = steps
            .iter()
            .map(|step| {
                let [lon, lat] = step.location;
                validate_coordinate(lon, lat)?;
                if !(step.distance.is_finite() && step.distance >= 0.0) {
                    return Err(SpatialError::invalid(format!(
                        "buffer radius must be a non-negative number of meters, got {}",
                        step.distance
                    )));
                }
                Ok(Buffer {
                    center: Point::new(lon, lat),
                    radius_meters: step.distance,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Built {} route buffers", buffers.len());

        Ok(Self { buffers })
    }

    /// Whether the set has no buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Number of buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// The buffers in step order.
    #[must_use]
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Polygons for every buffer, built once for repeated point tests.
    #[must_use]
    pub fn regions(&self) -> BufferRegions {
        BufferRegions {
            polygons: self.buffers.iter().map(Buffer::to_polygon).collect(),
        }
    }
}

/// The polygons of a [`BufferSet`], indexed like its buffers.
#[derive(Debug, Clone)]
pub struct BufferRegions {
    polygons: Vec<Option<Polygon<f64>>>,
}

impl BufferRegions {
    /// Indices of every buffer whose polygon intersects the point
    /// (boundary included). Empty buffers never match.
    pub fn containing(&self, longitude: f64, latitude: f64) -> impl Iterator<Item = usize> + '_ {
        let point = Point::new(longitude, latitude);
        self.polygons
            .iter()
            .enumerate()
            .filter(move |(_, polygon)| polygon.as_ref().is_some_and(|p| p.intersects(&point)))
            .map(|(i, _)| i)
    }
}

fn validate_coordinate(lon: f64, lat: f64) -> Result<(), SpatialError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(SpatialError::invalid(format!(
            "coordinate [{lon}, {lat}] is not finite"
        )));
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(SpatialError::invalid(format!(
            "coordinate [{lon}, {lat}] is outside WGS84 bounds"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Destination as _;

    const CHICAGO_BOX: [[f64; 2]; 4] = [[-87.7, 41.7], [-87.7, 41.9], [-87.5, 41.9], [-87.5, 41.7]];

    #[test]
    fn closed_ring_repeats_first_corner() {
        let bbox = BoundingBox::from_corners(&CHICAGO_BOX).unwrap();
        let ring = bbox.closed_ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(&ring[..4], &CHICAGO_BOX);
    }

    #[test]
    fn closed_ring_is_closed_for_any_corner_order() {
        let rotations = [
            [CHICAGO_BOX[1], CHICAGO_BOX[2], CHICAGO_BOX[3], CHICAGO_BOX[0]],
            [CHICAGO_BOX[3], CHICAGO_BOX[2], CHICAGO_BOX[1], CHICAGO_BOX[0]],
        ];
        for corners in rotations {
            let ring = BoundingBox::from_corners(&corners).unwrap().closed_ring();
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn parses_json_parameter() {
        let bbox =
            BoundingBox::parse_json("[[-87.7,41.7],[-87.7,41.9],[-87.5,41.9],[-87.5,41.7]]")
                .unwrap();
        assert_eq!(bbox.corners(), &CHICAGO_BOX);
    }

    #[test]
    fn rejects_too_few_points() {
        let err = BoundingBox::from_corners(&CHICAGO_BOX[..3]).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let mut corners = CHICAGO_BOX;
        corners[2][0] = f64::NAN;
        assert!(BoundingBox::from_corners(&corners).is_err());
        corners[2][0] = f64::INFINITY;
        assert!(BoundingBox::from_corners(&corners).is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut corners = CHICAGO_BOX;
        corners[1][1] = 91.0;
        assert!(BoundingBox::from_corners(&corners).is_err());
    }

    #[test]
    fn rejects_bow_tie_ring() {
        let bow_tie = [CHICAGO_BOX[0], CHICAGO_BOX[2], CHICAGO_BOX[1], CHICAGO_BOX[3]];
        assert!(BoundingBox::from_corners(&bow_tie).is_err());
    }

    #[test]
    fn rejects_degenerate_ring() {
        let flat = [[-87.7, 41.7], [-87.6, 41.7], [-87.5, 41.7], [-87.4, 41.7]];
        assert!(BoundingBox::from_corners(&flat).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(BoundingBox::parse_json("not json").is_err());
        assert!(BoundingBox::parse_json("[[1,2],[3]]").is_err());
    }

    #[test]
    fn intersects_includes_interior_and_excludes_exterior() {
        let bbox = BoundingBox::from_corners(&CHICAGO_BOX).unwrap();
        assert!(bbox.intersects_point(-87.6, 41.8));
        assert!(!bbox.intersects_point(-87.4, 41.8));
    }

    #[test]
    fn buffer_uses_geodesic_distance() {
        let regions = BufferSet::from_steps(&[RouteStep::new(-87.6298, 41.8781, 500.0)])
            .unwrap()
            .regions();
        // ~0.004 degrees of latitude is ~444 m
        assert_eq!(regions.containing(-87.6298, 41.8821).count(), 1);
        // ~0.006 degrees of latitude is ~666 m
        assert_eq!(regions.containing(-87.6298, 41.8841).count(), 0);
    }

    #[test]
    fn buffer_polygon_is_closed_ring() {
        let buffers = BufferSet::from_steps(&[RouteStep::new(-87.6298, 41.8781, 250.0)]).unwrap();
        let polygon = buffers.buffers()[0].to_polygon().unwrap();
        let exterior = polygon.exterior();
        assert_eq!(exterior.0.len(), BUFFER_SEGMENTS + 1);
        assert_eq!(exterior.0.first(), exterior.0.last());
    }

    #[test]
    fn containing_reports_every_overlapping_buffer() {
        let buffers = BufferSet::from_steps(&[
            RouteStep::new(-87.6298, 41.8781, 300.0),
            RouteStep::new(-87.6290, 41.8781, 300.0),
            RouteStep::new(-87.7000, 41.9500, 50.0),
        ])
        .unwrap();
        let hits: Vec<usize> = buffers.regions().containing(-87.6294, 41.8781).collect();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn empty_steps_make_empty_buffer_set() {
        let buffers = BufferSet::from_steps(&[]).unwrap();
        assert!(buffers.is_empty());
        assert_eq!(buffers.regions().containing(-87.6, 41.8).count(), 0);
    }

    #[test]
    fn zero_radius_buffer_is_empty() {
        let buffers = BufferSet::from_steps(&[RouteStep::new(-87.6244, 41.8827, 0.0)]).unwrap();
        assert_eq!(buffers.len(), 1);
        assert!(buffers.buffers()[0].to_polygon().is_none());
        assert_eq!(buffers.regions().containing(-87.6244, 41.8827).count(), 0);
    }

    #[test]
    fn containment_follows_the_polygon_not_the_circle() {
        let center = Point::new(-87.6298, 41.8781);
        let regions = BufferSet::from_steps(&[RouteStep::new(center.x(), center.y(), 400.0)])
            .unwrap()
            .regions();

        // Halfway between two vertices the chord sits ~398 m out.
        let between_vertices = Geodesic.destination(center, 5.625, 399.0);
        assert_eq!(
            regions.containing(between_vertices.x(), between_vertices.y()).count(),
            0
        );

        let on_vertex_bearing = Geodesic.destination(center, 0.0, 399.0);
        assert_eq!(
            regions.containing(on_vertex_bearing.x(), on_vertex_bearing.y()).count(),
            1
        );
    }

    #[test]
    fn rejects_negative_radius() {
        assert!(BufferSet::from_steps(&[RouteStep::new(-87.6, 41.8, -1.0)]).is_err());
    }

    #[test]
    fn step_identity_distinguishes_distance() {
        let a = RouteStep::new(-87.6, 41.8, 120.0);
        let b = RouteStep::new(-87.6, 41.8, 80.0);
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity(), RouteStep::new(-87.6, 41.8, 120.0).identity());
    }
}
