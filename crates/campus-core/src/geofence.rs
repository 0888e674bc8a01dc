//! Great-circle distance and the presence radius around a subject.

use crate::{attendance::AttendanceStatus, subject::Coordinates};

/// Mean Earth radius used by the haversine formula, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Radius within which a device counts as present.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

/// Haversine distance between two points, in metres.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
  let d_lat = (b.latitude - a.latitude).to_radians();
  let d_lon = (b.longitude - a.longitude).to_radians();
  let h = (d_lat / 2.0).sin().powi(2)
    + a.latitude.to_radians().cos()
      * b.latitude.to_radians().cos()
      * (d_lon / 2.0).sin().powi(2);
  let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
  EARTH_RADIUS_M * c
}

/// A circular fence around a stored coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
  pub radius_m: f64,
}

impl Default for Geofence {
  fn default() -> Self { Self { radius_m: DEFAULT_RADIUS_M } }
}

impl Geofence {
  pub fn new(radius_m: f64) -> Self { Self { radius_m } }

  /// The boundary itself counts as inside.
  pub fn classify(&self, distance_m: f64) -> AttendanceStatus {
    if distance_m <= self.radius_m {
      AttendanceStatus::Present
    } else {
      AttendanceStatus::Absent
    }
  }

  /// Distance from `center` to `position` together with its classification.
  pub fn evaluate(
    &self,
    center: Coordinates,
    position: Coordinates,
  ) -> (f64, AttendanceStatus) {
    let distance = haversine_m(position, center);
    (distance, self.classify(distance))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CAMPUS: Coordinates = Coordinates { latitude: 12.9716, longitude: 77.5946 };

  /// Move `meters` due north of `from`.
  fn north_of(from: Coordinates, meters: f64) -> Coordinates {
    let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
    Coordinates::new(from.latitude + d_lat, from.longitude)
  }

  #[test]
  fn distance_to_self_is_zero() {
    assert_eq!(haversine_m(CAMPUS, CAMPUS), 0.0);
  }

  #[test]
  fn distance_is_symmetric() {
    let pairs = [
      (CAMPUS, Coordinates::new(13.0827, 80.2707)),
      (Coordinates::new(-33.8688, 151.2093), Coordinates::new(51.5074, -0.1278)),
      (Coordinates::new(0.0, 179.9), Coordinates::new(0.0, -179.9)),
    ];
    for (a, b) in pairs {
      assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
    }
  }

  #[test]
  fn known_distance() {
    // One degree of latitude is ~111.19 km on a 6371 km sphere.
    let d = haversine_m(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
    assert!((d - 111_194.93).abs() < 1.0, "got {d}");
  }

  #[test]
  fn inside_fence_is_present() {
    let fence = Geofence::default();
    for meters in [0.0, 10.0, 49.0] {
      let (d, status) = fence.evaluate(CAMPUS, north_of(CAMPUS, meters));
      assert_eq!(status, AttendanceStatus::Present, "{meters} m -> {d}");
    }
  }

  #[test]
  fn outside_fence_is_absent() {
    let fence = Geofence::default();
    for meters in [51.0, 200.0, 10_000.0] {
      let (d, status) = fence.evaluate(CAMPUS, north_of(CAMPUS, meters));
      assert_eq!(status, AttendanceStatus::Absent, "{meters} m -> {d}");
    }
  }

  #[test]
  fn boundary_is_inclusive() {
    let fence = Geofence::default();
    assert_eq!(fence.classify(50.0), AttendanceStatus::Present);
    assert_eq!(fence.classify(50.000_001), AttendanceStatus::Absent);
  }

  #[test]
  fn custom_radius() {
    let fence = Geofence::new(150.0);
    let (_, status) = fence.evaluate(CAMPUS, north_of(CAMPUS, 120.0));
    assert_eq!(status, AttendanceStatus::Present);
  }
}
