//! Octree engine: geometry, node storage, mutation and queries.

mod bounds;
mod config;
mod frustum;
pub mod mutation;
mod node;
pub mod query;
pub mod serialize;
mod stats;
mod tree;
pub mod voxel;

pub use bounds::Bounds3D;
pub use config::OctreeConfig;
pub use frustum::{Frustum, FrustumClass, Plane};
pub use mutation::{BatchInsertResult, InsertResult, RemoveResult};
pub use node::{NodeArena, NodeId, OctreeNode};
pub use query::{FrustumResult, PointFilter, QueryOptions, QueryResult, RayOptions, RayResult};
pub use serialize::{SerializedOctree, SnapshotMetadata};
pub use stats::OctreeStats;
pub use tree::{Octree, Points};
pub use voxel::{Voxel, VoxelGrid};
