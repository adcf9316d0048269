//! Core value types: points with payloads, spheres and rays.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::constants::POINT_EPSILON;

/// A point in 3D space carrying an arbitrary payload.
///
/// Geometry never looks at `data`; it only travels with the position so
/// queries can hand it back to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3D<T = ()> {
  /// Position in world units.
  pub position: DVec3,
  /// Caller payload.
  pub data: T,
}

impl Point3D<()> {
  /// Create a payload-free point.
  #[inline]
  pub fn new(x: f64, y: f64, z: f64) -> Self {
    Self {
      position: DVec3::new(x, y, z),
      data: (),
    }
  }
}

impl<T> Point3D<T> {
  /// Create a point with a payload.
  #[inline]
  pub fn with_data(position: DVec3, data: T) -> Self {
    Self { position, data }
  }

  /// All three coordinates are finite (no NaN, no infinity).
  #[inline]
  pub fn is_finite(&self) -> bool {
    self.position.is_finite()
  }

  /// Same position as `other` within [`POINT_EPSILON`] on every axis.
  ///
  /// Payloads are ignored.
  #[inline]
  pub fn same_position<U>(&self, other: &Point3D<U>) -> bool {
    self.position.abs_diff_eq(other.position, POINT_EPSILON)
  }
}

impl From<DVec3> for Point3D<()> {
  fn from(position: DVec3) -> Self {
    Self { position, data: () }
  }
}

impl From<[f64; 3]> for Point3D<()> {
  fn from([x, y, z]: [f64; 3]) -> Self {
    Self::new(x, y, z)
  }
}

/// Sphere used for radius queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
  /// Center in world units.
  pub center: DVec3,
  /// Radius in world units.
  pub radius: f64,
}

impl Sphere {
  /// Create a new sphere.
  pub fn new(center: DVec3, radius: f64) -> Self {
    Self { center, radius }
  }

  /// Check if the sphere contains a point (surface inclusive).
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.distance(self.center) <= self.radius
  }
}

/// Half-line used for picking queries.
///
/// `direction` need not be normalized; it must be non-zero for the ray to hit
/// anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ray {
  /// Start of the ray.
  pub origin: DVec3,
  /// Direction of travel.
  pub direction: DVec3,
  /// Optional cut-off distance along the ray.
  pub max_distance: Option<f64>,
}

impl Ray {
  /// Create an unbounded ray.
  pub fn new(origin: DVec3, direction: DVec3) -> Self {
    Self {
      origin,
      direction,
      max_distance: None,
    }
  }

  /// Limit the ray to `max_distance` world units from the origin.
  pub fn with_max_distance(mut self, max_distance: f64) -> Self {
    self.max_distance = Some(max_distance);
    self
  }

  /// Unit direction, or `None` when the direction is zero or non-finite.
  #[inline]
  pub fn unit_direction(&self) -> Option<DVec3> {
    self.direction.try_normalize()
  }

  /// Point at distance `t` along the (normalized) ray.
  #[inline]
  pub fn at(&self, t: f64) -> Option<DVec3> {
    self.unit_direction().map(|dir| self.origin + dir * t)
  }

  /// Project `point` onto the ray.
  ///
  /// Returns `(t, perpendicular_distance)` where `t` is the distance along the
  /// ray from the origin. `None` if the direction is degenerate or the point
  /// lies behind the origin.
  pub fn project(&self, point: DVec3) -> Option<(f64, f64)> {
    let dir = self.unit_direction()?;
    let t = (point - self.origin).dot(dir);
    if t < 0.0 {
      return None;
    }
    let closest = self.origin + dir * t;
    Some((t, point.distance(closest)))
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
