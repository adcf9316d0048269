//! Error taxonomy for octree operations.

use glam::DVec3;

/// Errors reported by octree operations.
///
/// Validation and not-found errors are carried inside operation results
/// (`success = false`); structural misuse is returned as `Err`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OctreeError {
  /// A coordinate was NaN or infinite.
  #[error("invalid point: coordinates must be finite, got {0}")]
  InvalidPoint(DVec3),

  /// The point lies outside the root bounds.
  #[error("point {point} is outside octree bounds {min} - {max}")]
  OutOfBounds {
    /// Rejected point.
    point: DVec3,
    /// Root minimum corner.
    min: DVec3,
    /// Root maximum corner.
    max: DVec3,
  },

  /// No stored point matched the removal request.
  #[error("point {0} not found")]
  NotFound(DVec3),

  /// The operation needs at least one stored point.
  #[error("octree is empty")]
  EmptyTree,

  /// Voxel edge length was zero, negative or non-finite.
  #[error("invalid voxel size {0}: must be finite and positive")]
  InvalidVoxelSize(f64),

  /// The requested voxel grid would exceed the cell limit.
  #[error("voxel grid of {dimensions:?} cells exceeds the limit of {limit}")]
  VoxelGridTooLarge {
    /// Requested grid dimensions.
    dimensions: [usize; 3],
    /// Maximum permitted cell count.
    limit: usize,
  },
}
