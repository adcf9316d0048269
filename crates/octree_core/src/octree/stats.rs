//! Structural statistics.

use serde::{Deserialize, Serialize};

use super::{Octree, OctreeNode};
use crate::types::Point3D;

/// Snapshot of the tree's shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OctreeStats {
	/// Stored points.
	pub total_points: usize,
	/// Live nodes, internal and leaf.
	pub node_count: usize,
	/// Leaves.
	pub leaf_count: usize,
	/// Number of levels (deepest leaf depth + 1).
	pub height: u32,
	/// Mean depth over all leaves.
	pub average_depth: f64,
	/// Deepest leaf depth.
	pub max_depth: u32,
	/// Rough heap footprint in bytes. Comparable between trees, not exact.
	pub memory_usage: usize,
}

impl<T> Octree<T> {
	/// Compute structural statistics.
	///
	/// Counts are cached; depth figures walk the leaves.
	pub fn stats(&self) -> OctreeStats {
		let mut depth_sum = 0u64;
		let mut max_depth = 0u32;
		let mut leaves = 0usize;
		for (_, node) in self.nodes.iter().filter(|(_, n)| n.is_leaf()) {
			depth_sum += u64::from(node.depth);
			max_depth = max_depth.max(node.depth);
			leaves += 1;
		}

		let average_depth = if leaves == 0 {
			0.0
		} else {
			depth_sum as f64 / leaves as f64
		};

		OctreeStats {
			total_points: self.total_points,
			node_count: self.nodes.len(),
			leaf_count: self.leaf_count,
			height: max_depth + 1,
			average_depth,
			max_depth,
			memory_usage: self.nodes.len() * std::mem::size_of::<OctreeNode<T>>()
				+ self.total_points * std::mem::size_of::<Point3D<T>>(),
		}
	}

	/// Number of levels (deepest leaf depth + 1).
	pub fn height(&self) -> u32 {
		self.nodes
			.iter()
			.filter(|(_, n)| n.is_leaf())
			.map(|(_, n)| n.depth)
			.max()
			.unwrap_or(0)
			+ 1
	}
}
