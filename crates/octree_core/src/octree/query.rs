//! Spatial queries: axis-aligned box, sphere, ray and frustum.
//!
//! Every query is read-only and walks the tree with an explicit stack,
//! pruning subtrees whose bounds cannot contribute. `nodes_visited` counts
//! every node whose bounds were tested.

use glam::DVec3;
use smallvec::SmallVec;
use web_time::Instant;

use super::tree::elapsed_us;
use super::{Bounds3D, Frustum, FrustumClass, NodeId, Octree};
use crate::constants::RAY_HIT_TOLERANCE;
use crate::events::{EventData, OctreeEventKind, QueryKind};
use crate::types::{Point3D, Ray, Sphere};

type NodeStack = SmallVec<[NodeId; 64]>;

/// Caller-supplied point predicate.
pub type PointFilter<'a, T> = &'a dyn Fn(&Point3D<T>) -> bool;

/// Options shared by box, sphere and frustum queries.
pub struct QueryOptions<'a, T> {
  /// Boundary points count as inside.
  pub inclusive: bool,
  /// Stop after this many results.
  pub max_results: Option<usize>,
  /// Only points for which this returns true are reported.
  pub filter: Option<PointFilter<'a, T>>,
}

impl<'a, T> QueryOptions<'a, T> {
  /// Inclusive, unbounded, unfiltered.
  pub fn new() -> Self {
    Self {
      inclusive: true,
      max_results: None,
      filter: None,
    }
  }

  /// Treat boundary points as outside.
  pub fn exclusive(mut self) -> Self {
    self.inclusive = false;
    self
  }

  /// Cap the number of results.
  pub fn with_max_results(mut self, max_results: usize) -> Self {
    self.max_results = Some(max_results);
    self
  }

  /// Only report points accepted by `filter`.
  pub fn with_filter(mut self, filter: PointFilter<'a, T>) -> Self {
    self.filter = Some(filter);
    self
  }

  #[inline]
  fn accepts(&self, point: &Point3D<T>) -> bool {
    self.filter.map_or(true, |f| f(point))
  }

  #[inline]
  fn is_full(&self, found: usize) -> bool {
    self.max_results.is_some_and(|max| found >= max)
  }
}

impl<T> Default for QueryOptions<'_, T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Points found by a box or sphere query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult<T> {
  /// Matching points.
  pub points: Vec<Point3D<T>>,
  /// `points.len()`.
  pub count: usize,
  /// Nodes whose bounds were tested.
  pub nodes_visited: usize,
}

impl<T> Default for QueryResult<T> {
  fn default() -> Self {
    Self {
      points: Vec::new(),
      count: 0,
      nodes_visited: 0,
    }
  }
}

/// Options for [`Octree::ray_intersection`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayOptions {
  /// Report every hit instead of only the nearest.
  pub find_all: bool,
  /// Keep at most this many hits (nearest first). Only used with `find_all`.
  pub max_intersections: Option<usize>,
  /// Maximum perpendicular distance from the ray for a point to count.
  pub tolerance: f64,
}

impl RayOptions {
  /// Collect every hit, nearest first.
  pub fn all() -> Self {
    Self {
      find_all: true,
      ..Self::default()
    }
  }
}

impl Default for RayOptions {
  fn default() -> Self {
    Self {
      find_all: false,
      max_intersections: None,
      tolerance: RAY_HIT_TOLERANCE,
    }
  }
}

/// Points hit by a ray.
#[derive(Clone, Debug, PartialEq)]
pub struct RayResult<T> {
  /// Hits ordered by distance along the ray.
  pub points: Vec<Point3D<T>>,
  /// Distance along the ray of each hit.
  pub distances: Vec<f64>,
  /// Nodes whose bounds were tested.
  pub nodes_visited: usize,
}

impl<T> RayResult<T> {
  /// Nearest hit, if any.
  pub fn first(&self) -> Option<(&Point3D<T>, f64)> {
    self.points.first().zip(self.distances.first().copied())
  }
}

impl<T> Default for RayResult<T> {
  fn default() -> Self {
    Self {
      points: Vec::new(),
      distances: Vec::new(),
      nodes_visited: 0,
    }
  }
}

/// Outcome of [`Octree::frustum_culling`].
#[derive(Clone, Debug, PartialEq)]
pub struct FrustumResult<T> {
  /// Points inside the frustum.
  pub visible_points: Vec<Point3D<T>>,
  /// `visible_points.len()`.
  pub visible_count: usize,
  /// Points rejected by the frustum, either whole subtrees or one by one.
  pub culled_count: usize,
  /// Nodes whose bounds were classified.
  pub nodes_visited: usize,
}

impl<T> Default for FrustumResult<T> {
  fn default() -> Self {
    Self {
      visible_points: Vec::new(),
      visible_count: 0,
      culled_count: 0,
      nodes_visited: 0,
    }
  }
}

/// Best hit so far during a nearest-first ray walk.
struct NearestHit<'t, T> {
  distance: f64,
  point: &'t Point3D<T>,
}

impl<T: Clone> Octree<T> {
  /// Points inside an axis-aligned box.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::query_bounds"))]
  pub fn query_bounds(&self, bounds: &Bounds3D, options: &QueryOptions<'_, T>) -> QueryResult<T> {
    let start = Instant::now();
    let result = self.collect_in_bounds(bounds, options);
    self.finish_query(QueryKind::Bounds, start, result.count, result.nodes_visited);
    result
  }

  /// Points within `sphere.radius` of its center.
  ///
  /// A negative or non-finite radius matches nothing.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::query_sphere"))]
  pub fn query_sphere(&self, sphere: &Sphere, options: &QueryOptions<'_, T>) -> QueryResult<T> {
    let start = Instant::now();
    let mut result = QueryResult::default();

    if sphere.radius >= 0.0 && sphere.radius.is_finite() && sphere.center.is_finite() {
      let mut stack: NodeStack = SmallVec::new();
      stack.push(NodeId::ROOT);
      'walk: while let Some(id) = stack.pop() {
        let node = &self.nodes[id];
        result.nodes_visited += 1;
        if !node.bounds.intersects_sphere(sphere) {
          continue;
        }
        for point in &node.points {
          let distance = point.position.distance(sphere.center);
          let inside = if options.inclusive {
            distance <= sphere.radius
          } else {
            distance < sphere.radius
          };
          if inside && options.accepts(point) {
            result.points.push(point.clone());
            if options.is_full(result.points.len()) {
              break 'walk;
            }
          }
        }
        push_children(&mut stack, node.children);
      }
    }

    result.count = result.points.len();
    self.finish_query(QueryKind::Sphere, start, result.count, result.nodes_visited);
    result
  }

  /// Points within `options.tolerance` of a ray.
  ///
  /// By default only the nearest hit is reported; children are visited front
  /// to back and subtrees starting past the best hit are skipped. With
  /// `find_all` every hit is collected, sorted by distance, then truncated to
  /// `max_intersections`.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::ray_intersection"))]
  pub fn ray_intersection(&self, ray: &Ray, options: &RayOptions) -> RayResult<T> {
    let start = Instant::now();
    let mut result = RayResult::default();
    let tolerance = options.tolerance.max(0.0);

    result.nodes_visited = 1;
    let root_hit = self.bounds.inflate(tolerance).ray_intersection(ray);
    if root_hit.is_some() {
      if options.find_all {
        let mut hits = Vec::new();
        self.collect_ray_hits(ray, tolerance, &mut hits, &mut result.nodes_visited);
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(max) = options.max_intersections {
          hits.truncate(max);
        }
        for (distance, point) in hits {
          result.distances.push(distance);
          result.points.push(point.clone());
        }
      } else {
        let mut best = None;
        self.nearest_ray_hit(NodeId::ROOT, ray, tolerance, &mut best, &mut result.nodes_visited);
        if let Some(hit) = best {
          result.distances.push(hit.distance);
          result.points.push(hit.point.clone());
        }
      }
    }

    self.finish_query(QueryKind::Ray, start, result.points.len(), result.nodes_visited);
    result
  }

  /// Points inside a view frustum.
  ///
  /// Subtrees fully outside are counted as culled without visiting their
  /// points; subtrees fully inside are accepted without per-point plane
  /// tests. Points rejected by the caller's filter are neither visible nor
  /// culled.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::frustum_culling"))]
  pub fn frustum_culling(&self, frustum: &Frustum, options: &QueryOptions<'_, T>) -> FrustumResult<T> {
    let start = Instant::now();
    let mut result = FrustumResult::default();

    let mut stack: NodeStack = SmallVec::new();
    stack.push(NodeId::ROOT);
    'walk: while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      result.nodes_visited += 1;
      match frustum.classify(&node.bounds, options.inclusive) {
        FrustumClass::Outside => {
          result.culled_count += self.count_accepted(id, options);
        }
        FrustumClass::Inside => {
          if !self.accept_subtree(id, options, &mut result.visible_points) {
            break 'walk;
          }
        }
        FrustumClass::Intersect => {
          for point in node.points.iter().filter(|p| options.accepts(p)) {
            if !frustum.contains_point(point.position, options.inclusive) {
              result.culled_count += 1;
            } else {
              result.visible_points.push(point.clone());
              if options.is_full(result.visible_points.len()) {
                break 'walk;
              }
            }
          }
          push_children(&mut stack, node.children);
        }
      }
    }

    result.visible_count = result.visible_points.len();
    self.finish_query(
      QueryKind::Frustum,
      start,
      result.visible_count,
      result.nodes_visited,
    );
    result
  }

  /// Box walk without metrics or events.
  pub(super) fn collect_in_bounds(
    &self,
    bounds: &Bounds3D,
    options: &QueryOptions<'_, T>,
  ) -> QueryResult<T> {
    let mut result = QueryResult::default();
    let mut stack: NodeStack = SmallVec::new();
    stack.push(NodeId::ROOT);
    'walk: while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      result.nodes_visited += 1;
      if !node.bounds.overlaps(bounds) {
        continue;
      }
      for point in &node.points {
        let inside = if options.inclusive {
          bounds.contains_point(point.position)
        } else {
          bounds.strictly_contains_point(point.position)
        };
        if inside && options.accepts(point) {
          result.points.push(point.clone());
          if options.is_full(result.points.len()) {
            break 'walk;
          }
        }
      }
      push_children(&mut stack, node.children);
    }
    result.count = result.points.len();
    result
  }

  /// Every point in the subtree at `id`, filter applied. Returns false once
  /// `max_results` is reached.
  fn accept_subtree(
    &self,
    id: NodeId,
    options: &QueryOptions<'_, T>,
    out: &mut Vec<Point3D<T>>,
  ) -> bool {
    let mut stack: NodeStack = SmallVec::new();
    stack.push(id);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      for point in &node.points {
        if options.accepts(point) {
          out.push(point.clone());
          if options.is_full(out.len()) {
            return false;
          }
        }
      }
      push_children(&mut stack, node.children);
    }
    true
  }

  /// Points in the subtree rooted at `id` that pass the caller's filter.
  fn count_accepted(&self, id: NodeId, options: &QueryOptions<'_, T>) -> usize {
    if options.filter.is_none() {
      return self.subtree_point_count(id);
    }
    let mut count = 0;
    let mut stack: NodeStack = SmallVec::new();
    stack.push(id);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      count += node.points.iter().filter(|p| options.accepts(p)).count();
      push_children(&mut stack, node.children);
    }
    count
  }

  fn collect_ray_hits<'t>(
    &'t self,
    ray: &Ray,
    tolerance: f64,
    hits: &mut Vec<(f64, &'t Point3D<T>)>,
    visited: &mut usize,
  ) {
    let max_distance = ray.max_distance.unwrap_or(f64::INFINITY);
    let mut stack: NodeStack = SmallVec::new();
    stack.push(NodeId::ROOT);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      for point in &node.points {
        if let Some(distance) = ray_hit(ray, point.position, tolerance, max_distance) {
          hits.push((distance, point));
        }
      }
      if let Some(children) = node.children {
        for child in children.iter().rev() {
          *visited += 1;
          if self.nodes[*child]
            .bounds
            .inflate(tolerance)
            .ray_intersection(ray)
            .is_some()
          {
            stack.push(*child);
          }
        }
      }
    }
  }

  /// Front-to-back walk below a node whose bounds the ray already enters.
  fn nearest_ray_hit<'t>(
    &'t self,
    id: NodeId,
    ray: &Ray,
    tolerance: f64,
    best: &mut Option<NearestHit<'t, T>>,
    visited: &mut usize,
  ) {
    let max_distance = ray.max_distance.unwrap_or(f64::INFINITY);
    let node = &self.nodes[id];
    for point in &node.points {
      if let Some(distance) = ray_hit(ray, point.position, tolerance, max_distance) {
        if best.as_ref().map_or(true, |b| distance < b.distance) {
          *best = Some(NearestHit { distance, point });
        }
      }
    }

    let Some(children) = node.children else {
      return;
    };
    let mut entries: SmallVec<[(f64, NodeId); 8]> = SmallVec::new();
    for child in children {
      *visited += 1;
      if let Some((t_near, _)) = self.nodes[child].bounds.inflate(tolerance).ray_intersection(ray) {
        entries.push((t_near, child));
      }
    }
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (t_near, child) in entries {
      // Nothing in this child can beat a hit closer than its entry point
      if best.as_ref().is_some_and(|b| b.distance < t_near) {
        break;
      }
      self.nearest_ray_hit(child, ray, tolerance, best, visited);
    }
  }

  fn finish_query(&self, query: QueryKind, start: Instant, results: usize, nodes_visited: usize) {
    self.record(|m| m.record_query(query, elapsed_us(start)));
    tracing::trace!(?query, results, nodes_visited, "query executed");
    self.emit(OctreeEventKind::QueryExecuted, || EventData::Query {
      query,
      results,
      nodes_visited,
    });
  }
}

/// Push children so octant 0 is popped first.
#[inline]
fn push_children(stack: &mut NodeStack, children: Option<[NodeId; 8]>) {
  if let Some(children) = children {
    stack.extend(children.iter().rev().copied());
  }
}

/// Distance along the ray if `position` is within `tolerance` of it.
#[inline]
fn ray_hit(ray: &Ray, position: DVec3, tolerance: f64, max_distance: f64) -> Option<f64> {
  let (t, perpendicular) = ray.project(position)?;
  (perpendicular <= tolerance && t <= max_distance).then_some(t)
}

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;
