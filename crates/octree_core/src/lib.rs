//! Point octree for 3D spatial partitioning.
//!
//! Stores points (with an optional payload) inside a fixed axis-aligned
//! region, subdividing crowded leaves into 8 octants and merging them back
//! once emptied. Supports box, sphere, ray and frustum queries, voxel grid
//! export, flat serialization, structural events and performance counters.
//!
//! ```
//! use glam::DVec3;
//! use octree_core::{Bounds3D, Octree, OctreeConfig, Point3D, QueryOptions, Sphere};
//!
//! let mut tree = Octree::new(
//!   Bounds3D::new(DVec3::ZERO, DVec3::splat(100.0)),
//!   OctreeConfig::default().with_max_points(4),
//! );
//! tree.insert(Point3D::new(50.0, 50.0, 50.0));
//! tree.insert(Point3D::new(10.0, 10.0, 10.0));
//!
//! let near = tree.query_sphere(
//!   &Sphere::new(DVec3::splat(50.0), 15.0),
//!   &QueryOptions::new(),
//! );
//! assert_eq!(near.count, 1);
//! ```

pub mod constants;
pub mod error;
pub mod events;
pub mod metrics;
pub mod octree;
pub mod types;

pub use error::OctreeError;
pub use events::{EventData, HandlerId, OctreeEvent, OctreeEventKind, QueryKind};
pub use metrics::PerformanceMetrics;
pub use octree::{
  BatchInsertResult, Bounds3D, Frustum, FrustumClass, FrustumResult, InsertResult, NodeId, Octree,
  OctreeConfig, OctreeNode, OctreeStats, Plane, QueryOptions, QueryResult, RayOptions, RayResult,
  RemoveResult, SerializedOctree, Voxel, VoxelGrid,
};
pub use types::{Point3D, Ray, Sphere};
