//! Operation counters and latency tracking for an octree instance.
//!
//! Runtime-toggled through [`OctreeConfig::collect_metrics`]; when disabled
//! nothing is recorded.
//!
//! # Usage
//!
//! ```
//! use octree_core::{Octree, Bounds3D, OctreeConfig, Point3D};
//! use glam::DVec3;
//!
//! let mut tree = Octree::new(
//!     Bounds3D::new(DVec3::ZERO, DVec3::splat(10.0)),
//!     OctreeConfig::default(),
//! );
//! tree.insert(Point3D::new(1.0, 2.0, 3.0));
//!
//! let metrics = tree.performance_metrics();
//! assert_eq!(metrics.insertions, 1);
//! ```
//!
//! [`OctreeConfig::collect_metrics`]: crate::OctreeConfig::collect_metrics

use std::collections::VecDeque;

use crate::constants::LATENCY_WINDOW;
use crate::events::QueryKind;

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create a new rolling window with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// Get the number of values in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
    /// Compute the sum of all values.
    pub fn sum(&self) -> T {
        self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
    }
}

impl RollingWindow<u64> {
    /// Compute the average of all values.
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    /// Get min and max values.
    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = self.buffer.iter().min()?;
        let max = self.buffer.iter().max()?;
        Some((*min, *max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW)
    }
}

/// Cumulative mean that never stores samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    count: u64,
    mean: f64,
}

impl RunningAverage {
    /// Fold in a new sample.
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    /// Current mean (0 when no samples were recorded).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Number of samples folded in.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Running counters and latencies, per operation kind.
///
/// Latencies are in microseconds.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    /// Successful and failed insert calls.
    pub insertions: u64,
    /// Successful and failed remove calls.
    pub removals: u64,
    /// Bounds and sphere queries.
    pub spatial_queries: u64,
    /// Ray queries.
    pub ray_queries: u64,
    /// Frustum culling queries.
    pub frustum_queries: u64,

    /// Mean insert latency.
    pub avg_insert_us: RunningAverage,
    /// Mean remove latency.
    pub avg_remove_us: RunningAverage,
    /// Mean bounds/sphere query latency.
    pub avg_spatial_query_us: RunningAverage,
    /// Mean ray query latency.
    pub avg_ray_query_us: RunningAverage,
    /// Mean frustum query latency.
    pub avg_frustum_query_us: RunningAverage,

    /// Rolling window of the most recent query latencies (all kinds).
    pub recent_query_us: RollingWindow<u64>,
}

impl PerformanceMetrics {
    /// Create new metrics with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all metrics to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record an insert call.
    pub fn record_insert(&mut self, timing_us: u64) {
        self.insertions += 1;
        self.avg_insert_us.record(timing_us as f64);
    }

    /// Record a remove call.
    pub fn record_remove(&mut self, timing_us: u64) {
        self.removals += 1;
        self.avg_remove_us.record(timing_us as f64);
    }

    /// Record a finished query.
    pub fn record_query(&mut self, kind: QueryKind, timing_us: u64) {
        let sample = timing_us as f64;
        match kind {
            QueryKind::Bounds | QueryKind::Sphere => {
                self.spatial_queries += 1;
                self.avg_spatial_query_us.record(sample);
            }
            QueryKind::Ray => {
                self.ray_queries += 1;
                self.avg_ray_query_us.record(sample);
            }
            QueryKind::Frustum => {
                self.frustum_queries += 1;
                self.avg_frustum_query_us.record(sample);
            }
        }
        self.recent_query_us.push(timing_us);
    }

    /// Total queries of every kind.
    pub fn total_queries(&self) -> u64 {
        self.spatial_queries + self.ray_queries + self.frustum_queries
    }

    /// Mean of the recent query window in microseconds.
    pub fn recent_query_average_us(&self) -> f64 {
        self.recent_query_us.average()
    }

    /// Fastest and slowest query in the recent window.
    pub fn recent_query_range_us(&self) -> Option<(u64, u64)> {
        self.recent_query_us.min_max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window() {
        let mut window = RollingWindow::new(3);
        assert!(window.is_empty());

        window.push(10u64);
        window.push(20);
        window.push(30);
        assert_eq!(window.len(), 3);
        assert_eq!(window.sum(), 60);
        assert_eq!(window.average(), 20.0);

        // Push one more, oldest should be evicted
        window.push(40);
        assert_eq!(window.len(), 3);
        assert_eq!(window.sum(), 90);
        assert_eq!(window.average(), 30.0);

        let (min, max) = window.min_max().unwrap();
        assert_eq!(min, 20);
        assert_eq!(max, 40);
    }

    #[test]
    fn test_zero_capacity_window_stays_empty() {
        let mut window: RollingWindow<u64> = RollingWindow::new(0);
        window.push(5);
        assert!(window.is_empty());
        assert_eq!(window.min_max(), None);
    }

    #[test]
    fn test_running_average() {
        let mut avg = RunningAverage::default();
        assert_eq!(avg.mean(), 0.0);
        for v in [2.0, 4.0, 6.0, 8.0] {
            avg.record(v);
        }
        assert_eq!(avg.count(), 4);
        assert!((avg.mean() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_query_counters_by_kind() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record_query(QueryKind::Bounds, 10);
        metrics.record_query(QueryKind::Sphere, 30);
        metrics.record_query(QueryKind::Ray, 5);
        metrics.record_query(QueryKind::Frustum, 7);

        assert_eq!(metrics.spatial_queries, 2);
        assert_eq!(metrics.ray_queries, 1);
        assert_eq!(metrics.frustum_queries, 1);
        assert_eq!(metrics.total_queries(), 4);
        assert_eq!(metrics.avg_spatial_query_us.mean(), 20.0);
        assert_eq!(metrics.recent_query_us.len(), 4);
        assert_eq!(metrics.recent_query_average_us(), 13.0);
        assert_eq!(metrics.recent_query_range_us(), Some((5, 30)));
    }

    #[test]
    fn test_reset() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record_insert(3);
        metrics.record_remove(4);
        metrics.reset();
        assert_eq!(metrics.insertions, 0);
        assert_eq!(metrics.removals, 0);
        assert_eq!(metrics.avg_insert_us.count(), 0);
    }
}
