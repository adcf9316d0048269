//! OctreeConfig - subdivision, merge and instrumentation settings.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_POINTS};

/// Configuration for subdivision, merging and instrumentation.
///
/// Partial configurations merge over the defaults with struct-update syntax:
///
/// ```
/// use octree_core::OctreeConfig;
///
/// let config = OctreeConfig {
///   max_points: 4,
///   ..Default::default()
/// };
/// assert!(config.auto_subdivide);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
  /// Points a leaf may hold before it subdivides.
  pub max_points: usize,

  /// Hard depth ceiling. Leaves at this depth accept any number of points.
  pub max_depth: u32,

  /// Split overflowing leaves. When off, leaves grow without bound.
  pub auto_subdivide: bool,

  /// Collapse a parent once all 8 children are empty leaves.
  pub auto_merge: bool,

  /// After a merge, keep collapsing empty ancestors.
  /// Off by default: only the immediate parent is considered.
  pub cascade_merge: bool,

  /// Tag nodes with a level of detail (0 = finest, at `max_depth`).
  pub enable_lod: bool,

  /// Deliver structural and query events to registered handlers.
  pub emit_events: bool,

  /// Record operation counters and latencies.
  pub collect_metrics: bool,
}

impl OctreeConfig {
  /// Set the subdivision threshold.
  pub fn with_max_points(mut self, max_points: usize) -> Self {
    self.max_points = max_points;
    self
  }

  /// Set the depth ceiling.
  pub fn with_max_depth(mut self, max_depth: u32) -> Self {
    self.max_depth = max_depth;
    self
  }

  /// Enable or disable automatic subdivision.
  pub fn with_auto_subdivide(mut self, enabled: bool) -> Self {
    self.auto_subdivide = enabled;
    self
  }

  /// Enable or disable automatic merging.
  pub fn with_auto_merge(mut self, enabled: bool) -> Self {
    self.auto_merge = enabled;
    self
  }

  /// Enable or disable event delivery.
  pub fn with_events(mut self, enabled: bool) -> Self {
    self.emit_events = enabled;
    self
  }

  /// Level of detail for a node at `depth`.
  ///
  /// `lod = max_depth - depth` when LOD tagging is enabled, else 0.
  #[inline]
  pub fn lod_for_depth(&self, depth: u32) -> u32 {
    if self.enable_lod {
      self.max_depth.saturating_sub(depth)
    } else {
      0
    }
  }

  /// A leaf at `depth` holding `points` points must split on the next insert.
  #[inline]
  pub fn should_subdivide(&self, depth: u32, points: usize) -> bool {
    self.auto_subdivide && depth < self.max_depth && points >= self.max_points
  }
}

impl Default for OctreeConfig {
  fn default() -> Self {
    Self {
      max_points: DEFAULT_MAX_POINTS,
      max_depth: DEFAULT_MAX_DEPTH,
      auto_subdivide: true,
      auto_merge: true,
      cascade_merge: false,
      enable_lod: false,
      emit_events: false,
      collect_metrics: true,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
