//! Axis-aligned bounding box with double precision, plus the octant math and
//! intersection predicates used by tree descent.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::types::{Ray, Sphere};

/// Double-precision axis-aligned bounding box.
///
/// `center` and `size` are always derived from `min`/`max`, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds3D {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl Bounds3D {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Smallest AABB enclosing a sphere.
	pub fn from_sphere(sphere: &Sphere) -> Self {
		Self::from_center_half_extents(sphere.center, DVec3::splat(sphere.radius))
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &Bounds3D) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Check if this AABB contains a point (all six faces inclusive).
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Check if the point lies strictly inside (faces excluded).
	#[inline]
	pub fn strictly_contains_point(&self, point: DVec3) -> bool {
		point.x > self.min.x
			&& point.x < self.max.x
			&& point.y > self.min.y
			&& point.y < self.max.y
			&& point.z > self.min.z
			&& point.z < self.max.z
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Grow the box by `margin` on every face.
	#[inline]
	pub fn inflate(&self, margin: f64) -> Self {
		Self {
			min: self.min - DVec3::splat(margin),
			max: self.max + DVec3::splat(margin),
		}
	}

	/// Closest point of the box to `point` (the point itself when inside).
	#[inline]
	pub fn closest_point(&self, point: DVec3) -> DVec3 {
		point.clamp(self.min, self.max)
	}

	/// Check if the sphere touches this box.
	///
	/// Clamps the sphere center into the box and compares the distance to
	/// that clamped point against the radius.
	#[inline]
	pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
		let closest = self.closest_point(sphere.center);
		closest.distance_squared(sphere.center) <= sphere.radius * sphere.radius
	}

	/// Slab-method ray test.
	///
	/// Returns the parametric `(t_near, t_far)` interval, in world units along
	/// the normalized direction, for which the ray is inside the box. `t_near`
	/// is clamped to zero when the origin is inside. `None` on a miss, a
	/// degenerate direction, or when the box starts past `max_distance`.
	pub fn ray_intersection(&self, ray: &Ray) -> Option<(f64, f64)> {
		let dir = ray.unit_direction()?;
		let mut t_near = f64::NEG_INFINITY;
		let mut t_far = f64::INFINITY;

		for axis in 0..3 {
			let origin = ray.origin[axis];
			let d = dir[axis];
			let (lo, hi) = (self.min[axis], self.max[axis]);

			if d.abs() < f64::EPSILON {
				// Parallel to this slab: inside it or never.
				if origin < lo || origin > hi {
					return None;
				}
				continue;
			}

			let inv = 1.0 / d;
			let mut t0 = (lo - origin) * inv;
			let mut t1 = (hi - origin) * inv;
			if t0 > t1 {
				std::mem::swap(&mut t0, &mut t1);
			}
			t_near = t_near.max(t0);
			t_far = t_far.min(t1);
		}

		if t_near > t_far || t_far < 0.0 {
			return None;
		}
		let t_near = t_near.max(0.0);
		if let Some(max_distance) = ray.max_distance {
			if t_near > max_distance {
				return None;
			}
		}
		Some((t_near, t_far))
	}

	/// Octant index of `point` relative to this box's center.
	///
	/// Bit 0 = X, bit 1 = Y, bit 2 = Z; a bit is set when the coordinate is
	/// `>=` the center, so points exactly on a splitting plane go to the
	/// upper child.
	#[inline]
	pub fn octant_of(&self, point: DVec3) -> usize {
		let c = self.center();
		(point.x >= c.x) as usize | ((point.y >= c.y) as usize) << 1 | ((point.z >= c.z) as usize) << 2
	}

	/// Bounds of one of the 8 octants, using the same bit layout as
	/// [`octant_of`](Self::octant_of).
	pub fn octant(&self, octant: usize) -> Self {
		debug_assert!(octant < 8, "octant index must be in 0..8");
		let c = self.center();
		let pick = |bit: usize, lo: f64, mid: f64, hi: f64| {
			if octant & bit != 0 {
				(mid, hi)
			} else {
				(lo, mid)
			}
		};
		let (min_x, max_x) = pick(1, self.min.x, c.x, self.max.x);
		let (min_y, max_y) = pick(2, self.min.y, c.y, self.max.y);
		let (min_z, max_z) = pick(4, self.min.z, c.z, self.max.z);
		Self {
			min: DVec3::new(min_x, min_y, min_z),
			max: DVec3::new(max_x, max_y, max_z),
		}
	}

	/// All 8 octants in index order.
	pub fn octants(&self) -> [Self; 8] {
		std::array::from_fn(|i| self.octant(i))
	}

	/// The 8 corners, indexed with the octant bit layout.
	pub fn corners(&self) -> [DVec3; 8] {
		std::array::from_fn(|i| {
			DVec3::new(
				if i & 1 != 0 { self.max.x } else { self.min.x },
				if i & 2 != 0 { self.max.y } else { self.min.y },
				if i & 4 != 0 { self.max.z } else { self.min.z },
			)
		})
	}

	/// Volume of the box (zero for inverted boxes).
	#[inline]
	pub fn volume(&self) -> f64 {
		let s = self.size().max(DVec3::ZERO);
		s.x * s.y * s.z
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn unit_box() -> Bounds3D {
		Bounds3D::new(DVec3::ZERO, DVec3::splat(10.0))
	}

	#[test]
	fn test_new() {
		let aabb = Bounds3D::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(aabb.min, DVec3::new(-1.0, -2.0, -3.0));
		assert_eq!(aabb.max, DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(aabb.size(), DVec3::new(2.0, 4.0, 6.0));
		assert_eq!(aabb.center(), DVec3::ZERO);
	}

	#[test]
	fn test_overlaps_touching() {
		// Touching at boundary should count as overlapping
		let a = unit_box();
		let b = Bounds3D::new(DVec3::splat(10.0), DVec3::splat(20.0));
		assert!(a.overlaps(&b));
		assert!(b.overlaps(&a));

		let c = Bounds3D::new(DVec3::splat(11.0), DVec3::splat(20.0));
		assert!(!a.overlaps(&c));
	}

	#[test]
	fn test_contains_point_inclusive_and_strict() {
		let aabb = unit_box();
		assert!(aabb.contains_point(DVec3::ZERO));
		assert!(aabb.contains_point(DVec3::splat(10.0)));
		assert!(!aabb.strictly_contains_point(DVec3::ZERO));
		assert!(aabb.strictly_contains_point(DVec3::splat(5.0)));
		assert!(!aabb.contains_point(DVec3::splat(-1.0)));
	}

	#[test]
	fn test_octant_index_bits() {
		let aabb = unit_box();
		assert_eq!(aabb.octant_of(DVec3::splat(1.0)), 0);
		assert_eq!(aabb.octant_of(DVec3::new(9.0, 1.0, 1.0)), 1);
		assert_eq!(aabb.octant_of(DVec3::new(1.0, 9.0, 1.0)), 2);
		assert_eq!(aabb.octant_of(DVec3::new(1.0, 1.0, 9.0)), 4);
		assert_eq!(aabb.octant_of(DVec3::splat(9.0)), 7);
		// Ties go to the upper child
		assert_eq!(aabb.octant_of(DVec3::splat(5.0)), 7);
	}

	#[test]
	fn test_octant_bounds_agree_with_index() {
		let aabb = Bounds3D::new(DVec3::new(-4.0, 0.0, 10.0), DVec3::new(4.0, 2.0, 30.0));
		for (i, child) in aabb.octants().iter().enumerate() {
			assert_eq!(aabb.octant_of(child.center()), i, "octant {i}");
			assert!(aabb.contains_point(child.min) && aabb.contains_point(child.max));
		}
	}

	#[test]
	fn test_octants_reconstruct_parent() {
		let aabb = Bounds3D::new(DVec3::new(-3.0, 1.0, 2.0), DVec3::new(5.0, 9.0, 4.0));
		let octants = aabb.octants();
		let total: f64 = octants.iter().map(Bounds3D::volume).sum();
		assert!((total - aabb.volume()).abs() < 1e-9);

		let min = octants.iter().fold(DVec3::INFINITY, |acc, b| acc.min(b.min));
		let max = octants.iter().fold(DVec3::NEG_INFINITY, |acc, b| acc.max(b.max));
		assert_eq!(min, aabb.min);
		assert_eq!(max, aabb.max);
	}

	#[test]
	fn test_corners_follow_octant_layout() {
		let aabb = unit_box();
		let corners = aabb.corners();
		assert_eq!(corners[0], DVec3::ZERO);
		assert_eq!(corners[1], DVec3::new(10.0, 0.0, 0.0));
		assert_eq!(corners[6], DVec3::new(0.0, 10.0, 10.0));
		assert_eq!(corners[7], DVec3::splat(10.0));
	}

	#[test]
	fn test_intersects_sphere() {
		let aabb = unit_box();
		// Center inside
		assert!(aabb.intersects_sphere(&Sphere::new(DVec3::splat(5.0), 0.1)));
		// Touching a face
		assert!(aabb.intersects_sphere(&Sphere::new(DVec3::new(12.0, 5.0, 5.0), 2.0)));
		// Near a corner but outside along the diagonal
		assert!(!aabb.intersects_sphere(&Sphere::new(DVec3::splat(12.0), 3.0)));
		assert!(aabb.intersects_sphere(&Sphere::new(DVec3::splat(12.0), 3.5)));
	}

	#[test]
	fn test_ray_hits_box_from_outside() {
		let aabb = unit_box();
		let ray = Ray::new(DVec3::new(-5.0, 5.0, 5.0), DVec3::X);
		let (t_near, t_far) = aabb.ray_intersection(&ray).unwrap();
		assert!((t_near - 5.0).abs() < 1e-12);
		assert!((t_far - 15.0).abs() < 1e-12);
	}

	#[test]
	fn test_ray_origin_inside_clamps_near() {
		let aabb = unit_box();
		let ray = Ray::new(DVec3::splat(5.0), DVec3::new(0.0, -1.0, 0.0));
		let (t_near, t_far) = aabb.ray_intersection(&ray).unwrap();
		assert_eq!(t_near, 0.0);
		assert!((t_far - 5.0).abs() < 1e-12);
	}

	#[test]
	fn test_ray_misses() {
		let aabb = unit_box();
		// Pointing away
		assert!(aabb.ray_intersection(&Ray::new(DVec3::splat(-1.0), DVec3::splat(-1.0))).is_none());
		// Parallel to a slab and outside it
		assert!(aabb.ray_intersection(&Ray::new(DVec3::new(-1.0, 20.0, 5.0), DVec3::X)).is_none());
		// Stops before reaching the box
		let short = Ray::new(DVec3::new(-5.0, 5.0, 5.0), DVec3::X).with_max_distance(4.0);
		assert!(aabb.ray_intersection(&short).is_none());
		// Degenerate direction
		assert!(aabb.ray_intersection(&Ray::new(DVec3::splat(5.0), DVec3::ZERO)).is_none());
	}

	#[test]
	fn test_ray_along_face() {
		// Parallel to X, lying exactly in the y = 0 face
		let aabb = unit_box();
		let ray = Ray::new(DVec3::new(-1.0, 0.0, 5.0), DVec3::X);
		assert!(aabb.ray_intersection(&ray).is_some());
	}
}
