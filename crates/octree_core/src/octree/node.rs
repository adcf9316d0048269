//! OctreeNode - one cell of the spatial partition, stored in an index arena.
//!
//! Nodes own their children through arena indices and observe their parent
//! through a plain index, so there are no reference cycles.

use super::Bounds3D;
use crate::types::Point3D;

/// Arena handle for a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
  /// The root always occupies the first slot.
  pub const ROOT: Self = Self(0);

  /// Slot index in the arena.
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// One cell of the octree.
///
/// A node is a leaf exactly when `children` is `None`; internal nodes own
/// exactly 8 children and store no points.
#[derive(Clone, Debug)]
pub struct OctreeNode<T> {
  /// Region covered by this node. Fixed at creation.
  pub bounds: Bounds3D,
  /// Distance from the root (root = 0).
  pub depth: u32,
  /// Owning node, `None` for the root.
  pub parent: Option<NodeId>,
  /// Children in octant order (bit 0 = X, bit 1 = Y, bit 2 = Z).
  pub children: Option<[NodeId; 8]>,
  /// Points stored directly in this node.
  pub points: Vec<Point3D<T>>,
  /// Level-of-detail tag (0 = finest). Informational only.
  pub lod: u32,
}

impl<T> OctreeNode<T> {
  /// Create a new empty leaf.
  pub fn new_leaf(bounds: Bounds3D, depth: u32, parent: Option<NodeId>, lod: u32) -> Self {
    Self {
      bounds,
      depth,
      parent,
      children: None,
      points: Vec::new(),
      lod,
    }
  }

  /// Check if this node has no children.
  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// Check if this is an empty leaf (merge candidate).
  #[inline]
  pub fn is_empty_leaf(&self) -> bool {
    self.is_leaf() && self.points.is_empty()
  }

  /// Child in the given octant, if subdivided.
  #[inline]
  pub fn child(&self, octant: usize) -> Option<NodeId> {
    self.children.map(|c| c[octant])
  }
}

/// Flat node storage with slot reuse.
///
/// Slots freed by a merge are recycled by later subdivisions, so a long-lived
/// tree does not grow its arena under insert/remove churn.
#[derive(Clone, Debug)]
pub struct NodeArena<T> {
  slots: Vec<Option<OctreeNode<T>>>,
  free_list: Vec<NodeId>,
  live: usize,
}

impl<T> NodeArena<T> {
  /// Create an arena holding only `root`.
  pub fn with_root(root: OctreeNode<T>) -> Self {
    Self {
      slots: vec![Some(root)],
      free_list: Vec::new(),
      live: 1,
    }
  }

  /// Number of live nodes.
  #[inline]
  pub fn len(&self) -> usize {
    self.live
  }

  /// An arena always holds at least the root.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.live == 0
  }

  /// Number of slots ever allocated (live + free).
  #[inline]
  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Store a node, reusing a free slot when possible.
  pub fn alloc(&mut self, node: OctreeNode<T>) -> NodeId {
    self.live += 1;
    if let Some(id) = self.free_list.pop() {
      self.slots[id.index()] = Some(node);
      id
    } else {
      self.slots.push(Some(node));
      NodeId((self.slots.len() - 1) as u32)
    }
  }

  /// Release a slot, returning the node it held.
  pub fn free(&mut self, id: NodeId) -> Option<OctreeNode<T>> {
    let node = self.slots.get_mut(id.index())?.take()?;
    self.live -= 1;
    self.free_list.push(id);
    Some(node)
  }

  /// Borrow a live node.
  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&OctreeNode<T>> {
    self.slots.get(id.index())?.as_ref()
  }

  /// Mutably borrow a live node.
  #[inline]
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut OctreeNode<T>> {
    self.slots.get_mut(id.index())?.as_mut()
  }

  /// Drop every node and start over with a new root.
  pub fn reset(&mut self, root: OctreeNode<T>) {
    self.slots.clear();
    self.free_list.clear();
    self.slots.push(Some(root));
    self.live = 1;
  }

  /// Iterate over live nodes with their ids.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OctreeNode<T>)> {
    self
      .slots
      .iter()
      .enumerate()
      .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
  }
}

impl<T> std::ops::Index<NodeId> for NodeArena<T> {
  type Output = OctreeNode<T>;

  fn index(&self, id: NodeId) -> &Self::Output {
    match self.get(id) {
      Some(node) => node,
      None => panic!("stale node id {:?}", id),
    }
  }
}

impl<T> std::ops::IndexMut<NodeId> for NodeArena<T> {
  fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
    match self.get_mut(id) {
      Some(node) => node,
      None => panic!("stale node id {:?}", id),
    }
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
