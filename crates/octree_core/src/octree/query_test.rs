use std::cell::RefCell;
use std::rc::Rc;

use glam::{DMat4, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::octree::OctreeConfig;

fn cube(size: f64) -> Bounds3D {
  Bounds3D::new(DVec3::ZERO, DVec3::splat(size))
}

fn random_tree(seed: u64, count: usize) -> (Octree, Vec<Point3D>) {
  let mut rng = StdRng::seed_from_u64(seed);
  let points: Vec<Point3D> = (0..count)
    .map(|_| {
      Point3D::new(
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..100.0),
      )
    })
    .collect();
  let tree = Octree::with_points(
    cube(100.0),
    OctreeConfig::default().with_max_points(4),
    points.clone(),
  );
  (tree, points)
}

fn sorted(mut positions: Vec<DVec3>) -> Vec<DVec3> {
  positions.sort_by(|a, b| {
    a.x.total_cmp(&b.x)
      .then(a.y.total_cmp(&b.y))
      .then(a.z.total_cmp(&b.z))
  });
  positions
}

fn positions<T>(points: &[Point3D<T>]) -> Vec<DVec3> {
  sorted(points.iter().map(|p| p.position).collect())
}

// =========================================================================
// Bounds and sphere queries
// =========================================================================

#[test]
fn test_query_bounds_matches_brute_force() {
  let (tree, points) = random_tree(11, 400);
  let query = Bounds3D::new(DVec3::new(20.0, 30.0, 10.0), DVec3::new(55.0, 70.0, 45.0));

  let result = tree.query_bounds(&query, &QueryOptions::new());
  let expected: Vec<DVec3> = points
    .iter()
    .filter(|p| query.contains_point(p.position))
    .map(|p| p.position)
    .collect();

  assert_eq!(result.count, result.points.len());
  assert_eq!(positions(&result.points), sorted(expected));
  assert!(result.nodes_visited >= 1);
}

/// Subtrees outside the query are skipped.
#[test]
fn test_query_bounds_prunes() {
  let (tree, _) = random_tree(5, 400);
  let query = Bounds3D::new(DVec3::splat(1.0), DVec3::splat(2.0));
  let result = tree.query_bounds(&query, &QueryOptions::new());
  assert!(result.nodes_visited < tree.node_count());
}

#[test]
fn test_query_bounds_inclusive_edges() {
  let mut tree = Octree::new(cube(100.0), OctreeConfig::default());
  tree.insert(Point3D::new(10.0, 10.0, 10.0));
  tree.insert(Point3D::new(15.0, 15.0, 15.0));
  let query = Bounds3D::new(DVec3::splat(10.0), DVec3::splat(20.0));

  assert_eq!(tree.query_bounds(&query, &QueryOptions::new()).count, 2);
  assert_eq!(tree.query_bounds(&query, &QueryOptions::new().exclusive()).count, 1);
}

#[test]
fn test_query_outside_root_is_empty() {
  let (tree, _) = random_tree(1, 50);
  let far = Bounds3D::new(DVec3::splat(200.0), DVec3::splat(300.0));
  let result = tree.query_bounds(&far, &QueryOptions::new());
  assert_eq!(result.count, 0);
  assert_eq!(result.nodes_visited, 1);
}

#[test]
fn test_query_max_results_and_filter() {
  let (tree, _) = random_tree(9, 300);
  let whole = cube(100.0);

  let capped = tree.query_bounds(&whole, &QueryOptions::new().with_max_results(5));
  assert_eq!(capped.count, 5);

  let upper_half = |p: &Point3D| p.position.x >= 50.0;
  let filtered = tree.query_bounds(&whole, &QueryOptions::new().with_filter(&upper_half));
  assert!(filtered.count > 0);
  assert!(filtered.points.iter().all(|p| p.position.x >= 50.0));
}

#[test]
fn test_query_sphere_matches_brute_force() {
  let (tree, points) = random_tree(21, 400);
  let sphere = Sphere::new(DVec3::new(40.0, 60.0, 50.0), 22.5);

  let result = tree.query_sphere(&sphere, &QueryOptions::new());
  let expected: Vec<DVec3> = points
    .iter()
    .filter(|p| p.position.distance(sphere.center) <= sphere.radius)
    .map(|p| p.position)
    .collect();
  assert_eq!(positions(&result.points), sorted(expected));
}

/// A sphere query is the bounding-box query filtered by distance.
#[test]
fn test_sphere_is_subset_of_enclosing_box() {
  let (tree, _) = random_tree(33, 500);
  let mut rng = StdRng::seed_from_u64(99);
  for _ in 0..20 {
    let sphere = Sphere::new(
      DVec3::new(
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..100.0),
      ),
      rng.random_range(1.0..40.0),
    );
    let in_sphere = tree.query_sphere(&sphere, &QueryOptions::new());
    let in_box = tree.query_bounds(&Bounds3D::from_sphere(&sphere), &QueryOptions::new());

    let expected: Vec<DVec3> = in_box
      .points
      .iter()
      .filter(|p| p.position.distance(sphere.center) <= sphere.radius)
      .map(|p| p.position)
      .collect();
    assert_eq!(positions(&in_sphere.points), sorted(expected));
  }
}

#[test]
fn test_negative_radius_matches_nothing() {
  let (tree, _) = random_tree(2, 100);
  let result = tree.query_sphere(&Sphere::new(DVec3::splat(50.0), -5.0), &QueryOptions::new());
  assert_eq!(result.count, 0);
}

#[test]
fn test_query_returns_payloads() {
  let mut tree: Octree<u32> = Octree::new(cube(10.0), OctreeConfig::default());
  tree.insert(Point3D::with_data(DVec3::splat(1.0), 7));
  tree.insert(Point3D::with_data(DVec3::splat(9.0), 8));

  let result = tree.query_sphere(&Sphere::new(DVec3::ZERO, 2.0), &QueryOptions::new());
  assert_eq!(result.points.len(), 1);
  assert_eq!(result.points[0].data, 7);
}

// =========================================================================
// Ray queries
// =========================================================================

fn diagonal_tree() -> Octree {
  let mut tree = Octree::new(cube(100.0), OctreeConfig::default().with_max_points(1));
  tree.insert(Point3D::new(10.0, 10.0, 10.0));
  tree.insert(Point3D::new(20.0, 20.0, 20.0));
  tree.insert(Point3D::new(60.0, 10.0, 10.0));
  tree
}

#[test]
fn test_ray_first_hit_is_nearest() {
  let tree = diagonal_tree();
  let ray = Ray::new(DVec3::ZERO, DVec3::ONE).with_max_distance(100.0);

  let result = tree.ray_intersection(&ray, &RayOptions::default());
  assert_eq!(result.points.len(), 1);
  assert!(result.points[0].same_position(&Point3D::new(10.0, 10.0, 10.0)));
  let (_, distance) = result.first().unwrap();
  assert!((distance - 300f64.sqrt()).abs() < 1e-9);
}

/// Nearest hit is found even when it lives in a later octant.
#[test]
fn test_ray_nearest_across_octants() {
  let mut tree = Octree::new(cube(100.0), OctreeConfig::default().with_max_points(1));
  tree.insert(Point3D::new(10.0, 50.0, 50.0));
  tree.insert(Point3D::new(60.0, 50.0, 50.0));
  tree.insert(Point3D::new(90.0, 50.0, 50.0));

  // Travelling -X from the far side: octant 1 side is entered first
  let ray = Ray::new(DVec3::new(100.0, 50.0, 50.0), DVec3::NEG_X);
  let result = tree.ray_intersection(&ray, &RayOptions::default());
  assert!(result.points[0].same_position(&Point3D::new(90.0, 50.0, 50.0)));
  assert!((result.distances[0] - 10.0).abs() < 1e-9);
}

#[test]
fn test_ray_find_all_sorted() {
  let tree = diagonal_tree();
  let ray = Ray::new(DVec3::ZERO, DVec3::ONE).with_max_distance(100.0);

  let result = tree.ray_intersection(&ray, &RayOptions::all());
  assert_eq!(result.points.len(), 2);
  assert_eq!(result.distances.len(), 2);
  assert!(result.points[0].same_position(&Point3D::new(10.0, 10.0, 10.0)));
  assert!(result.points[1].same_position(&Point3D::new(20.0, 20.0, 20.0)));
  assert!(result.distances[0] < result.distances[1]);
}

#[test]
fn test_ray_max_intersections() {
  let tree = diagonal_tree();
  let ray = Ray::new(DVec3::ZERO, DVec3::ONE);
  let options = RayOptions {
    max_intersections: Some(1),
    ..RayOptions::all()
  };
  let result = tree.ray_intersection(&ray, &options);
  assert_eq!(result.points.len(), 1);
  assert!(result.points[0].same_position(&Point3D::new(10.0, 10.0, 10.0)));
}

#[test]
fn test_ray_max_distance_cuts_off() {
  let tree = diagonal_tree();
  let ray = Ray::new(DVec3::ZERO, DVec3::ONE).with_max_distance(20.0);
  let result = tree.ray_intersection(&ray, &RayOptions::all());
  assert_eq!(result.points.len(), 1);
}

#[test]
fn test_ray_miss_and_degenerate() {
  let tree = diagonal_tree();

  let away = Ray::new(DVec3::splat(-10.0), DVec3::NEG_ONE);
  let result = tree.ray_intersection(&away, &RayOptions::all());
  assert!(result.points.is_empty());
  assert_eq!(result.nodes_visited, 1);

  let zero = Ray::new(DVec3::ZERO, DVec3::ZERO);
  assert!(tree.ray_intersection(&zero, &RayOptions::all()).points.is_empty());
}

#[test]
fn test_ray_tolerance() {
  let mut tree = Octree::new(cube(100.0), OctreeConfig::default());
  tree.insert(Point3D::new(50.0, 50.5, 50.0));
  let ray = Ray::new(DVec3::new(0.0, 50.0, 50.0), DVec3::X);

  assert!(tree.ray_intersection(&ray, &RayOptions::default()).points.is_empty());
  let loose = RayOptions {
    tolerance: 1.0,
    ..RayOptions::default()
  };
  assert_eq!(tree.ray_intersection(&ray, &loose).points.len(), 1);
}

/// First-hit and find-all agree on the nearest point.
#[test]
fn test_ray_first_hit_agrees_with_find_all() {
  let (tree, _) = random_tree(77, 600);
  let mut rng = StdRng::seed_from_u64(8);
  for _ in 0..25 {
    let origin = DVec3::new(rng.random_range(0.0..100.0), -1.0, rng.random_range(0.0..100.0));
    let ray = Ray::new(origin, DVec3::Y);
    let options = RayOptions {
      tolerance: 2.0,
      ..RayOptions::default()
    };
    let first = tree.ray_intersection(&ray, &options);
    let all = tree.ray_intersection(&ray, &RayOptions { find_all: true, ..options });

    assert_eq!(first.points.is_empty(), all.points.is_empty());
    if let (Some((_, a)), Some((_, b))) = (first.first(), all.first()) {
      assert!((a - b).abs() < 1e-9);
    }
  }
}

// =========================================================================
// Frustum culling
// =========================================================================

fn camera_frustum() -> Frustum {
  // Camera at the root center looking down -Z.
  let eye = DVec3::new(50.0, 50.0, 100.0);
  let view = DMat4::look_at_rh(eye, eye + DVec3::NEG_Z, DVec3::Y);
  let proj = DMat4::perspective_rh(std::f64::consts::FRAC_PI_4, 1.0, 0.1, 200.0);
  Frustum::from_view_projection(proj * view)
}

#[test]
fn test_frustum_matches_brute_force() {
  let (tree, points) = random_tree(55, 500);
  let frustum = camera_frustum();

  let result = tree.frustum_culling(&frustum, &QueryOptions::new());
  let expected: Vec<DVec3> = points
    .iter()
    .filter(|p| frustum.contains_point(p.position, true))
    .map(|p| p.position)
    .collect();

  assert_eq!(result.visible_count, expected.len());
  assert_eq!(positions(&result.visible_points), sorted(expected));
  assert_eq!(result.visible_count + result.culled_count, tree.size());
}

#[test]
fn test_frustum_box_inside_and_outside() {
  let mut tree = Octree::new(cube(100.0), OctreeConfig::default().with_max_points(1));
  tree.insert(Point3D::new(10.0, 10.0, 10.0));
  tree.insert(Point3D::new(90.0, 90.0, 90.0));
  tree.insert(Point3D::new(80.0, 80.0, 80.0));

  let frustum = Frustum::from_bounds(&Bounds3D::new(DVec3::splat(60.0), DVec3::splat(100.0)));
  let result = tree.frustum_culling(&frustum, &QueryOptions::new());
  assert_eq!(result.visible_count, 2);
  assert_eq!(result.culled_count, 1);
}

#[test]
fn test_frustum_filter_is_not_culling() {
  let (tree, _) = random_tree(4, 200);
  let frustum = Frustum::from_bounds(&cube(100.0));
  let none = |_: &Point3D| false;

  let result = tree.frustum_culling(&frustum, &QueryOptions::new().with_filter(&none));
  assert_eq!(result.visible_count, 0);
  assert_eq!(result.culled_count, 0);
}

/// Filter-rejected points count as neither visible nor culled, even in
/// subtrees that lie fully outside the frustum.
#[test]
fn test_frustum_counts_only_filtered_points() {
  let (tree, points) = random_tree(21, 400);
  let frustum = Frustum::from_bounds(&Bounds3D::new(DVec3::ZERO, DVec3::splat(40.0)));
  let left = |p: &Point3D| p.position.x < 50.0;

  let result = tree.frustum_culling(&frustum, &QueryOptions::new().with_filter(&left));
  let kept: Vec<&Point3D> = points.iter().filter(|p| left(*p)).collect();
  let visible = kept
    .iter()
    .filter(|p| frustum.contains_point(p.position, true))
    .count();

  assert_eq!(result.visible_count, visible);
  assert_eq!(result.culled_count, kept.len() - visible);
}

#[test]
fn test_frustum_max_results() {
  let (tree, _) = random_tree(6, 200);
  let frustum = Frustum::from_bounds(&cube(100.0));
  let result = tree.frustum_culling(&frustum, &QueryOptions::new().with_max_results(10));
  assert_eq!(result.visible_count, 10);
}

// =========================================================================
// Instrumentation
// =========================================================================

#[test]
fn test_queries_emit_events_and_metrics() {
  let (mut tree, _) = random_tree(12, 50);
  tree.set_config(OctreeConfig::default().with_max_points(4).with_events(true));
  let seen = Rc::new(RefCell::new(Vec::new()));
  let sink = seen.clone();
  tree.add_event_handler(move |e| {
    if let EventData::Query { query, .. } = e.data {
      sink.borrow_mut().push(query);
    }
  });

  tree.query_bounds(&cube(50.0), &QueryOptions::new());
  tree.query_sphere(&Sphere::new(DVec3::splat(50.0), 5.0), &QueryOptions::new());
  tree.ray_intersection(&Ray::new(DVec3::ZERO, DVec3::ONE), &RayOptions::default());
  tree.frustum_culling(&camera_frustum(), &QueryOptions::new());

  assert_eq!(
    *seen.borrow(),
    vec![
      QueryKind::Bounds,
      QueryKind::Sphere,
      QueryKind::Ray,
      QueryKind::Frustum
    ]
  );
  let metrics = tree.performance_metrics();
  assert_eq!(metrics.spatial_queries, 2);
  assert_eq!(metrics.ray_queries, 1);
  assert_eq!(metrics.frustum_queries, 1);
}
