// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Geofence Evaluator
//!
//! Circular per-vehicle boundaries and the inside/outside predicate.
//!
//! Distances use the haversine formula on a spherical earth with mean radius
//! [`EARTH_RADIUS_M`]. The fleet operates inside a bounded region, so there is
//! no special handling for poles or the antimeridian; the only numeric guard is
//! clamping the haversine term into `[0, 1]` so that rounding can never yield a
//! NaN or negative distance.
//!
//! [`GeofenceRegistry`] is built once from configuration and never mutated, so
//! it can be shared behind an `Arc` by any number of pipeline workers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::position::VehicleId;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude must be a finite number in [-90, 90], got {0}")]
    Latitude(f64),

    #[error("longitude must be a finite number in [-180, 180], got {0}")]
    Longitude(f64),
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Great-circle distance in meters between two points.
pub fn haversine_distance_m(from: Coordinates, to: Coordinates) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_phi = (to.latitude - from.latitude).to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    #[error("radius must be a positive finite number of meters, got {0}")]
    InvalidRadius(f64),

    #[error(transparent)]
    InvalidCenter(#[from] CoordinateError),
}

/// Circular boundary: a center and an inclusive radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceBoundary {
    pub center: Coordinates,
    pub radius_meters: f64,
}

impl GeofenceBoundary {
    pub fn new(center: Coordinates, radius_meters: f64) -> Result<Self, GeofenceError> {
        let boundary = Self { center, radius_meters };
        boundary.validate()?;
        Ok(boundary)
    }

    /// Re-checks a boundary that may have been deserialized without going
    /// through [`GeofenceBoundary::new`].
    pub fn validate(&self) -> Result<(), GeofenceError> {
        Coordinates::new(self.center.latitude, self.center.longitude)?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(GeofenceError::InvalidRadius(self.radius_meters));
        }
        Ok(())
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        haversine_distance_m(point, self.center) <= self.radius_meters
    }
}

/// Verdict for `point` against an optional boundary.
///
/// Vehicles without a configured boundary are never flagged (fail-open).
pub fn evaluate(point: Coordinates, boundary: Option<&GeofenceBoundary>) -> bool {
    match boundary {
        Some(boundary) => boundary.contains(point),
        None => true,
    }
}

/// Immutable vehicle → boundary lookup, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct GeofenceRegistry {
    boundaries: HashMap<VehicleId, GeofenceBoundary>,
}

impl GeofenceRegistry {
    pub fn new(boundaries: HashMap<VehicleId, GeofenceBoundary>) -> Self {
        Self { boundaries }
    }

    pub fn boundary_for(&self, vehicle_id: &VehicleId) -> Option<&GeofenceBoundary> {
        self.boundaries.get(vehicle_id)
    }

    pub fn evaluate(&self, vehicle_id: &VehicleId, point: Coordinates) -> bool {
        evaluate(point, self.boundary_for(vehicle_id))
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

impl FromIterator<(VehicleId, GeofenceBoundary)> for GeofenceRegistry {
    fn from_iter<T: IntoIterator<Item = (VehicleId, GeofenceBoundary)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bangalore() -> Coordinates {
        Coordinates::new(12.9716, 77.5946).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(haversine_distance_m(bangalore(), bangalore()), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let origin = Coordinates::new(0.0, 0.0).unwrap();
        let north = Coordinates::new(1.0, 0.0).unwrap();
        // 2πR / 360
        let expected = 111_194.93;
        assert!((haversine_distance_m(origin, north) - expected).abs() < 1.0);
    }

    #[test]
    fn test_known_fleet_distance() {
        let far = Coordinates::new(13.2, 77.8).unwrap();
        let distance = haversine_distance_m(bangalore(), far);
        assert!(distance > 33_000.0 && distance < 35_000.0, "got {}", distance);
    }

    #[test]
    fn test_distance_is_finite_for_extremes() {
        let pairs = [
            ((90.0, 0.0), (-90.0, 0.0)),
            ((0.0, 180.0), (0.0, -180.0)),
            ((0.0, 0.0), (0.0, 180.0)),
            ((-90.0, -180.0), (90.0, 180.0)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let d = haversine_distance_m(
                Coordinates::new(lat1, lon1).unwrap(),
                Coordinates::new(lat2, lon2).unwrap(),
            );
            assert!(d.is_finite());
            assert!(d >= 0.0);
        }
    }

    #[test]
    fn test_evaluate_without_boundary_is_inside() {
        let far = Coordinates::new(-45.0, -120.0).unwrap();
        assert!(evaluate(far, None));
    }

    #[test]
    fn test_center_is_always_inside() {
        for radius in [0.001, 1.0, 5_000.0, 1.0e7] {
            let boundary = GeofenceBoundary::new(bangalore(), radius).unwrap();
            assert!(evaluate(bangalore(), Some(&boundary)));
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let origin = Coordinates::new(0.0, 0.0).unwrap();
        let point = Coordinates::new(0.5, 0.5).unwrap();
        let exact = haversine_distance_m(point, origin);

        let on_edge = GeofenceBoundary::new(origin, exact).unwrap();
        assert!(on_edge.contains(point));

        let too_small = GeofenceBoundary::new(origin, exact - 0.01).unwrap();
        assert!(!too_small.contains(point));
    }

    #[test]
    fn test_evaluate_matches_distance_predicate() {
        let boundary = GeofenceBoundary::new(bangalore(), 5_000.0).unwrap();
        let points = [
            (12.9716, 77.5946),
            (13.0, 77.6),
            (13.2, 77.8),
            (12.95, 77.55),
            (12.9, 77.5946),
        ];
        for (lat, lon) in points {
            let p = Coordinates::new(lat, lon).unwrap();
            assert_eq!(
                evaluate(p, Some(&boundary)),
                haversine_distance_m(p, boundary.center) <= boundary.radius_meters
            );
        }
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!(matches!(Coordinates::new(90.1, 0.0), Err(CoordinateError::Latitude(_))));
        assert!(matches!(Coordinates::new(0.0, -180.5), Err(CoordinateError::Longitude(_))));
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_invalid_radius_rejected() {
        for radius in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(GeofenceBoundary::new(bangalore(), radius).is_err());
        }
    }

    #[test]
    fn test_registry_lookup() {
        let vehicle = VehicleId::parse("vehicle-1").unwrap();
        let other = VehicleId::parse("vehicle-9").unwrap();
        let registry: GeofenceRegistry =
            [(vehicle.clone(), GeofenceBoundary::new(bangalore(), 5_000.0).unwrap())]
                .into_iter()
                .collect();

        let far = Coordinates::new(13.2, 77.8).unwrap();
        assert!(!registry.evaluate(&vehicle, far));
        assert!(registry.evaluate(&other, far));
        assert_eq!(registry.len(), 1);
    }
}
