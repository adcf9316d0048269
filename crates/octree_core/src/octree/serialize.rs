//! Flat, serde-friendly snapshot of a tree.
//!
//! Only points and configuration are stored; the node structure is rebuilt
//! by reinsertion, so a restored tree is equivalent but not necessarily
//! identical in shape.

use serde::{Deserialize, Serialize};

use super::{Bounds3D, Octree, OctreeConfig};
use crate::types::Point3D;

/// Descriptive counters recorded at snapshot time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
  /// Stored points.
  pub total_points: usize,
  /// Number of levels.
  pub height: u32,
  /// Live nodes.
  pub node_count: usize,
}

/// Points plus configuration, in traversal order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedOctree<T> {
  /// Every stored point.
  pub points: Vec<Point3D<T>>,
  /// Configuration to rebuild with.
  pub config: OctreeConfig,
  /// Shape of the tree when it was serialized. Informational.
  #[serde(default)]
  pub metadata: SnapshotMetadata,
}

impl<T: Clone> Octree<T> {
  /// Snapshot every point and the configuration.
  pub fn serialize(&self) -> SerializedOctree<T> {
    SerializedOctree {
      points: self.iter().cloned().collect(),
      config: self.config.clone(),
      metadata: SnapshotMetadata {
        total_points: self.total_points,
        height: self.height(),
        node_count: self.nodes.len(),
      },
    }
  }

  /// Rebuild a tree over `bounds` from a snapshot.
  ///
  /// Points outside `bounds` (or non-finite) are dropped and logged.
  pub fn deserialize(serialized: SerializedOctree<T>, bounds: Bounds3D) -> Self {
    let expected = serialized.points.len();
    let tree = Self::with_points(bounds, serialized.config, serialized.points);
    if tree.size() != expected {
      tracing::warn!(
        expected,
        restored = tree.size(),
        "snapshot points dropped on restore"
      );
    }
    tree
  }
}

#[cfg(test)]
#[path = "serialize_test.rs"]
mod serialize_test;
