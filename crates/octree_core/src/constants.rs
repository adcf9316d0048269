//! Numeric tolerances and sizing constants shared by the octree engine.

/// Per-axis absolute tolerance used when matching a point for removal.
pub const POINT_EPSILON: f64 = 1e-9;

/// Maximum perpendicular distance between a point and a ray that still counts
/// as a hit.
pub const RAY_HIT_TOLERANCE: f64 = 1e-3;

/// Number of children created by a subdivision (and discarded by a merge).
pub const OCTANT_COUNT: usize = 8;

/// Upper limit on the number of cells a voxel grid may allocate.
pub const MAX_VOXELS: usize = 1 << 24;

/// Default subdivision threshold (points per leaf).
pub const DEFAULT_MAX_POINTS: usize = 8;

/// Default depth ceiling.
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Number of samples kept in rolling latency windows.
pub const LATENCY_WINDOW: usize = 128;
