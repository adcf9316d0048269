//! View frustum as six half-spaces, with point and box classification.

use glam::{DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use super::Bounds3D;

/// Half-space `dot(point, normal) + distance > 0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
  /// Plane normal, pointing into the kept half-space.
  pub normal: DVec3,
  /// Signed offset from the origin.
  pub distance: f64,
}

impl Plane {
  /// Create a plane from a normal and offset.
  pub fn new(normal: DVec3, distance: f64) -> Self {
    Self { normal, distance }
  }

  /// Plane through `point` facing along `normal`.
  pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
    Self {
      normal,
      distance: -normal.dot(point),
    }
  }

  /// Signed distance (scaled by the normal length) of `point` to the plane.
  #[inline]
  pub fn signed_distance(&self, point: DVec3) -> f64 {
    self.normal.dot(point) + self.distance
  }

  /// Check if the point is on the kept side.
  ///
  /// With `inclusive`, points exactly on the plane count as inside.
  #[inline]
  pub fn contains(&self, point: DVec3, inclusive: bool) -> bool {
    let d = self.signed_distance(point);
    if inclusive {
      d >= 0.0
    } else {
      d > 0.0
    }
  }

  fn from_row(row: DVec4) -> Self {
    let normal = row.truncate();
    let len = normal.length();
    if len > 0.0 {
      Self {
        normal: normal / len,
        distance: row.w / len,
      }
    } else {
      Self {
        normal,
        distance: row.w,
      }
    }
  }
}

/// Result of testing a box against a frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrustumClass {
  /// Every corner is outside at least one common plane.
  Outside,
  /// Every corner is inside every plane.
  Inside,
  /// Anything else: the box straddles the frustum boundary.
  Intersect,
}

/// Six planes: left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
  /// The bounding planes. Order does not affect classification.
  pub planes: [Plane; 6],
}

impl Frustum {
  /// Create a frustum from six planes.
  pub fn new(planes: [Plane; 6]) -> Self {
    Self { planes }
  }

  /// Extract the frustum of a combined `projection * view` matrix.
  ///
  /// Uses a 0..1 clip-space depth range, matching glam's `perspective_rh` and
  /// `perspective_lh`. Planes come out normalized and facing inwards.
  pub fn from_view_projection(m: DMat4) -> Self {
    let r0 = m.row(0);
    let r1 = m.row(1);
    let r2 = m.row(2);
    let r3 = m.row(3);
    Self {
      planes: [
        Plane::from_row(r3 + r0), // left
        Plane::from_row(r3 - r0), // right
        Plane::from_row(r3 + r1), // bottom
        Plane::from_row(r3 - r1), // top
        Plane::from_row(r2),      // near
        Plane::from_row(r3 - r2), // far
      ],
    }
  }

  /// Axis-aligned box expressed as a frustum (handy for tests and ortho views).
  pub fn from_bounds(bounds: &Bounds3D) -> Self {
    Self {
      planes: [
        Plane::from_point_normal(bounds.min, DVec3::X),
        Plane::from_point_normal(bounds.max, DVec3::NEG_X),
        Plane::from_point_normal(bounds.min, DVec3::Y),
        Plane::from_point_normal(bounds.max, DVec3::NEG_Y),
        Plane::from_point_normal(bounds.min, DVec3::Z),
        Plane::from_point_normal(bounds.max, DVec3::NEG_Z),
      ],
    }
  }

  /// Check if the point is inside every half-space.
  #[inline]
  pub fn contains_point(&self, point: DVec3, inclusive: bool) -> bool {
    self.planes.iter().all(|p| p.contains(point, inclusive))
  }

  /// Classify a box by testing its 8 corners against each plane.
  pub fn classify(&self, bounds: &Bounds3D, inclusive: bool) -> FrustumClass {
    let corners = bounds.corners();
    let mut fully_inside = true;
    for plane in &self.planes {
      // Outside is strictly behind a plane, regardless of `inclusive`.
      if corners.iter().all(|c| plane.signed_distance(*c) < 0.0) {
        return FrustumClass::Outside;
      }
      if !corners.iter().all(|c| plane.contains(*c, inclusive)) {
        fully_inside = false;
      }
    }
    if fully_inside {
      FrustumClass::Inside
    } else {
      FrustumClass::Intersect
    }
  }
}

#[cfg(test)]
#[path = "frustum_test.rs"]
mod frustum_test;
