//! Route corridor geometry and the proximity test.
//!
//! The corridor is a `geo` [`LineString`] in (x = longitude, y = latitude)
//! order. Every query point goes through [`to_geo_point`] so the axis
//! order of the line and of the query always agree.

use geo::{Coord, Distance, Euclidean, LineString, Point};
use route_safety_corridor_models::GeoPoint;
use thiserror::Error;

use crate::{CorridorError, polyline};

/// A route with too few points to form a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Route geometry needs at least 2 points, got {points}")]
pub struct InvalidGeometryError {
    /// Number of points the route actually had.
    pub points: usize,
}

/// Outcome of a single proximity test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Planar distance from the hazard to the corridor, in degrees.
    pub distance: f64,
    /// `distance < tolerance`.
    pub is_near: bool,
}

/// An immutable route line supporting point-distance queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCorridor {
    line: LineString<f64>,
}

impl RouteCorridor {
    /// Builds a corridor from decoded route points.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGeometryError`] if fewer than two points are given.
    pub fn build(points: &[GeoPoint]) -> Result<Self, InvalidGeometryError> {
        if points.len() < 2 {
            return Err(InvalidGeometryError {
                points: points.len(),
            });
        }

        let line = points
            .iter()
            .map(|p| Coord {
                x: p.longitude(),
                y: p.latitude(),
            })
            .collect::<Vec<_>>();

        Ok(Self {
            line: LineString::new(line),
        })
    }

    /// Decodes an encoded polyline and builds a corridor from it.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError`] if the polyline is malformed or decodes to
    /// fewer than two points.
    pub fn from_encoded(path: &str) -> Result<Self, CorridorError> {
        let points = polyline::decode(path)?;
        Ok(Self::build(&points)?)
    }

    /// Number of route vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.line.0.len()
    }

    /// The underlying line geometry.
    #[must_use]
    pub const fn line(&self) -> &LineString<f64> {
        &self.line
    }

    /// Minimum planar distance from `hazard` to the route, in degrees.
    #[must_use]
    pub fn distance(&self, hazard: GeoPoint) -> f64 {
        Euclidean.distance(&to_geo_point(hazard), &self.line)
    }

    /// Runs the proximity test for one hazard.
    ///
    /// A hazard exactly `tolerance` away is not near.
    #[must_use]
    pub fn proximity(&self, hazard: GeoPoint, tolerance: f64) -> Proximity {
        let distance = self.distance(hazard);
        Proximity {
            distance,
            is_near: distance < tolerance,
        }
    }

    /// Whether `hazard` lies strictly within `tolerance` of the route.
    #[must_use]
    pub fn is_near(&self, hazard: GeoPoint, tolerance: f64) -> bool {
        self.proximity(hazard, tolerance).is_near
    }
}

/// Converts a [`GeoPoint`] into the corridor's (longitude, latitude) axis
/// order.
#[must_use]
pub fn to_geo_point(point: GeoPoint) -> Point<f64> {
    Point::new(point.longitude(), point.latitude())
}

/// Minimum planar distance from `hazard` to `corridor`, in degrees.
#[must_use]
pub fn distance(corridor: &RouteCorridor, hazard: GeoPoint) -> f64 {
    corridor.distance(hazard)
}

/// Whether `hazard` lies strictly within `tolerance` of `corridor`.
#[must_use]
pub fn is_near(corridor: &RouteCorridor, hazard: GeoPoint, tolerance: f64) -> bool {
    corridor.is_near(hazard, tolerance)
}

/// Decodes `path` and tests one hazard against it, keeping geometry
/// failures distinguishable from "outside the corridor".
///
/// # Errors
///
/// Returns [`CorridorError`] if the route cannot be turned into a corridor.
pub fn check_proximity(
    path: &str,
    hazard: GeoPoint,
    tolerance: f64,
) -> Result<Proximity, CorridorError> {
    let corridor = RouteCorridor::from_encoded(path)?;
    let proximity = corridor.proximity(hazard, tolerance);

    log::trace!(
        "Hazard ({}, {}): distance={:.6}° tolerance={tolerance:.6}° near={}",
        hazard.latitude(),
        hazard.longitude(),
        proximity.distance,
        proximity.is_near
    );

    Ok(proximity)
}

/// Tests one hazard against an encoded route, treating an unusable route
/// as "not near".
///
/// The geometry failure is logged rather than returned so a corrupt route
/// yields zero hazards instead of aborting the caller.
#[must_use]
pub fn is_hazard_near_route(path: &str, hazard: GeoPoint, tolerance: f64) -> bool {
    match check_proximity(path, hazard, tolerance) {
        Ok(proximity) => proximity.is_near,
        Err(e) => {
            log::warn!("Treating hazard as not near an unusable route: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).unwrap()
    }

    fn north_south_corridor() -> RouteCorridor {
        RouteCorridor::build(&[point(40.0, -73.0), point(40.01, -73.0)]).unwrap()
    }

    #[test]
    fn build_requires_two_points() {
        assert_eq!(
            RouteCorridor::build(&[]),
            Err(InvalidGeometryError { points: 0 })
        );
        assert_eq!(
            RouteCorridor::build(&[point(40.0, -73.0)]),
            Err(InvalidGeometryError { points: 1 })
        );
        assert_eq!(north_south_corridor().vertex_count(), 2);
    }

    #[test]
    fn stores_longitude_as_x() {
        let corridor = north_south_corridor();
        let first = corridor.line().0[0];
        assert!((first.x - -73.0).abs() < f64::EPSILON);
        assert!((first.y - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hazard_between_vertices_is_near() {
        let corridor = north_south_corridor();
        assert!(is_near(&corridor, point(40.005, -73.0), 0.01));
        assert!(distance(&corridor, point(40.005, -73.0)) < 1e-9);
    }

    #[test]
    fn distant_hazard_is_not_near() {
        let corridor = north_south_corridor();
        assert!(!is_near(&corridor, point(41.0, -73.0), 0.01));
        assert!((distance(&corridor, point(41.0, -73.0)) - 0.99).abs() < 1e-9);
    }

    #[test]
    fn query_points_use_corridor_axis_order() {
        assert_eq!(to_geo_point(point(40.0, -73.0)), Point::new(-73.0, 40.0));

        let corridor = north_south_corridor();
        assert!(corridor.is_near(point(40.002, -73.0002), 0.0005));
        assert!(!corridor.is_near(point(40.002, -73.0006), 0.0005));
    }

    #[test]
    fn tolerance_boundary_is_exclusive() {
        let corridor = RouteCorridor::build(&[point(0.0, 0.0), point(0.0, 1.0)]).unwrap();
        let hazard = point(0.0, 1.5);
        assert!((corridor.distance(hazard) - 0.5).abs() < f64::EPSILON);
        assert!(!corridor.is_near(hazard, 0.5));
        assert!(corridor.is_near(hazard, 0.500_001));
    }

    #[test]
    fn vertices_are_near_for_any_positive_tolerance() {
        let points = polyline::decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let corridor = RouteCorridor::build(&points).unwrap();
        for vertex in &points {
            for tolerance in [1e-12, 1e-6, 0.0005, 1.0] {
                assert!(corridor.is_near(*vertex, tolerance));
            }
        }
    }

    #[test]
    fn check_proximity_distinguishes_bad_routes() {
        let hazard = point(38.5, -120.2);
        assert!(matches!(
            check_proximity("_p~iF", hazard, 0.1),
            Err(CorridorError::Decode(_))
        ));
        assert!(matches!(
            check_proximity("_p~iF~ps|U", hazard, 0.1),
            Err(CorridorError::Geometry(InvalidGeometryError { points: 1 }))
        ));
        assert!(
            check_proximity("_p~iF~ps|U_ulLnnqC", hazard, 0.1)
                .unwrap()
                .is_near
        );
    }

    #[test]
    fn unusable_route_is_never_near() {
        let hazard = point(38.5, -120.2);
        assert!(!is_hazard_near_route("", hazard, 10.0));
        assert!(!is_hazard_near_route("not a polyline", hazard, 10.0));
        assert!(is_hazard_near_route(
            "_p~iF~ps|U_ulLnnqC_mqNvxq`@",
            hazard,
            0.0005
        ));
    }
}
