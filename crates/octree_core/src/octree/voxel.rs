//! Uniform voxel grid built over the root bounds.
//!
//! Interior voxel faces are half-open (a point on a shared face belongs to
//! the upper voxel) while faces on the root's max boundary are closed, so the
//! occupied voxels partition the stored points.

use glam::DVec3;

use super::query::QueryOptions;
use super::{Bounds3D, Octree};
use crate::constants::MAX_VOXELS;
use crate::error::OctreeError;
use crate::types::Point3D;

/// One cell of a [`VoxelGrid`].
#[derive(Clone, Debug, PartialEq)]
pub struct Voxel<T> {
  /// Integer coordinates `[x, y, z]` in the grid.
  pub index: [usize; 3],
  /// Region covered by the voxel.
  pub bounds: Bounds3D,
  /// The voxel holds at least one point.
  pub occupied: bool,
  /// Points inside the voxel.
  pub points: Vec<Point3D<T>>,
}

/// Dense grid of voxels, x-major.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid<T> {
  /// Minimum corner of voxel `[0, 0, 0]`.
  pub origin: DVec3,
  /// Edge length of every voxel.
  pub voxel_size: f64,
  /// Voxel count along each axis.
  pub dimensions: [usize; 3],
  /// All voxels; see [`VoxelGrid::linear_index`] for the layout.
  pub voxels: Vec<Voxel<T>>,
}

impl<T> VoxelGrid<T> {
  /// Flat index of `[x, y, z]`.
  #[inline]
  pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
    x + y * self.dimensions[0] + z * self.dimensions[0] * self.dimensions[1]
  }

  /// Voxel at `[x, y, z]`, `None` out of range.
  pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&Voxel<T>> {
    let [dx, dy, dz] = self.dimensions;
    if x >= dx || y >= dy || z >= dz {
      return None;
    }
    self.voxels.get(self.linear_index(x, y, z))
  }

  /// Voxel containing `position`, `None` outside the grid.
  ///
  /// Uses the same half-open faces as [`Octree::create_voxel_grid`], so the
  /// voxel returned is the one that holds a stored point.
  pub fn voxel_at(&self, position: DVec3) -> Option<&Voxel<T>> {
    let x = self.axis_cell(0, position.x)?;
    let y = self.axis_cell(1, position.y)?;
    let z = self.axis_cell(2, position.z)?;
    self.get(x, y, z)
  }

  /// Layer along `axis` whose span holds `value`.
  fn axis_cell(&self, axis: usize, value: f64) -> Option<usize> {
    let last = self.dimensions[axis].checked_sub(1)?;
    let span = |i: usize| {
      let mut index = [0; 3];
      index[axis] = i;
      let bounds = &self.get(index[0], index[1], index[2])?.bounds;
      Some((bounds.min[axis], bounds.max[axis]))
    };

    let guess = ((value - self.origin[axis]) / self.voxel_size).floor();
    if !guess.is_finite() {
      return None;
    }
    // Division rounding can land one layer off near a face
    let mut cell = (guess.max(0.0) as usize).min(last);
    let (min, max) = span(cell)?;
    if value < min {
      cell = cell.checked_sub(1)?;
    } else if value >= max && cell < last {
      cell += 1;
    }

    let (min, max) = span(cell)?;
    let inside = value >= min && (value < max || (cell == last && value <= max));
    inside.then_some(cell)
  }

  /// Total voxels.
  #[inline]
  pub fn len(&self) -> usize {
    self.voxels.len()
  }

  /// Check if the grid has no voxels.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.voxels.is_empty()
  }

  /// Occupied voxels.
  pub fn iter_occupied(&self) -> impl Iterator<Item = &Voxel<T>> {
    self.voxels.iter().filter(|v| v.occupied)
  }

  /// Number of occupied voxels.
  pub fn occupied_count(&self) -> usize {
    self.iter_occupied().count()
  }
}

impl<T: Clone> Octree<T> {
  /// Partition the root bounds into cubes of edge `voxel_size`.
  ///
  /// Grid dimensions are `ceil(size / voxel_size)` per axis (at least 1); the
  /// last layer always ends on the root's max face. Each voxel is filled with
  /// a box query.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::create_voxel_grid"))]
  pub fn create_voxel_grid(&self, voxel_size: f64) -> Result<VoxelGrid<T>, OctreeError> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
      return Err(OctreeError::InvalidVoxelSize(voxel_size));
    }
    if self.is_empty() {
      return Err(OctreeError::EmptyTree);
    }

    let size = self.bounds.size();
    let axis_cells = |extent: f64| ((extent / voxel_size).ceil() as usize).max(1);
    let dimensions = [axis_cells(size.x), axis_cells(size.y), axis_cells(size.z)];
    let total = dimensions[0]
      .checked_mul(dimensions[1])
      .and_then(|n| n.checked_mul(dimensions[2]))
      .filter(|n| *n <= MAX_VOXELS)
      .ok_or(OctreeError::VoxelGridTooLarge {
        dimensions,
        limit: MAX_VOXELS,
      })?;

    let origin = self.bounds.min;
    let root_max = self.bounds.max;
    // Neighbouring voxels share one computed face value, so no point can
    // fall between them or inside both
    let face = |axis: usize, i: usize| {
      if i >= dimensions[axis] {
        root_max[axis]
      } else {
        (origin[axis] + i as f64 * voxel_size).min(root_max[axis])
      }
    };

    let mut voxels = Vec::with_capacity(total);
    for z in 0..dimensions[2] {
      for y in 0..dimensions[1] {
        for x in 0..dimensions[0] {
          let index = [x, y, z];
          let bounds = Bounds3D::new(
            DVec3::new(face(0, x), face(1, y), face(2, z)),
            DVec3::new(face(0, x + 1), face(1, y + 1), face(2, z + 1)),
          );

          // Upper faces are open unless this is the last layer on that axis
          let owns = |p: &Point3D<T>| {
            (0..3).all(|axis| {
              index[axis] + 1 == dimensions[axis] || p.position[axis] < bounds.max[axis]
            })
          };
          let options = QueryOptions::new().with_filter(&owns);
          let points = self.collect_in_bounds(&bounds, &options).points;

          voxels.push(Voxel {
            index,
            bounds,
            occupied: !points.is_empty(),
            points,
          });
        }
      }
    }

    tracing::debug!(?dimensions, voxel_size, "voxel grid built");
    Ok(VoxelGrid {
      origin,
      voxel_size,
      dimensions,
      voxels,
    })
  }
}

#[cfg(test)]
#[path = "voxel_test.rs"]
mod voxel_test;
