//! Ray intersection math: slab test, Möller–Trumbore, BVH traversal.
//!
//! These routines mirror what the compute kernel does on the device and serve as
//! the host-side reference for validating it. [`brute_force_intersect`] is an
//! independent O(N) oracle; [`intersect_bvh`] must agree with it on hit/no-hit
//! for every ray, and on distance within floating tolerance.
//!
//! Möller–Trumbore setup for ray `o + t d` and triangle `v0, v1, v2`:
//!
//! ```text
//! e1 = v1 - v0,  e2 = v2 - v0
//! P = d × e2,    det = e1 · P
//! T = o - v0,    Q = T × e1
//! u = (T · P) / det,  v = (d · Q) / det,  t = (e2 · Q) / det
//! ```

use crate::bvh::Bvh;
use crate::geometry::{Triangle, TriangleStore};
use crate::math::{Ray, Vec3};

/// Rejects near-parallel rays (`|det|`) and near-origin hits (`t`).
pub const RAY_EPSILON: f32 = 1e-6;

/// Direction components smaller than this are clamped before taking the reciprocal.
pub const INV_DIR_EPSILON: f32 = 1e-8;

/// Per-axis reciprocal of `dir`, with near-zero components replaced by a signed
/// epsilon so no axis ever divides by zero.
#[inline]
pub fn safe_inverse(dir: Vec3) -> Vec3 {
    #[inline]
    fn recip(d: f32) -> f32 {
        if d.abs() < INV_DIR_EPSILON {
            1.0 / INV_DIR_EPSILON.copysign(d)
        } else {
            1.0 / d
        }
    }
    Vec3::new(recip(dir.x), recip(dir.y), recip(dir.z))
}

/// Slab test. True iff the ray's parametric interval inside the box overlaps `[0, t_max]`.
#[inline]
pub fn ray_aabb(origin: Vec3, inv_dir: Vec3, box_min: Vec3, box_max: Vec3, t_max: f32) -> bool {
    let t0 = (box_min - origin) * inv_dir;
    let t1 = (box_max - origin) * inv_dir;
    let t_near = t0.min(t1).max_element().max(0.0);
    let t_far = t0.max(t1).min_element().min(t_max);
    t_near <= t_far
}

/// Möller–Trumbore. Returns the hit distance `t > RAY_EPSILON`, in units of `dir`.
#[inline]
pub fn ray_triangle(origin: Vec3, dir: Vec3, tri: &Triangle) -> Option<f32> {
    let e1 = tri.v1 - tri.v0;
    let e2 = tri.v2 - tri.v0;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < RAY_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = origin - tri.v0;
    let u = tvec.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = tvec.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(q) * inv_det;
    (t > RAY_EPSILON).then_some(t)
}

/// Work counters from one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub nodes_visited: u32,
    pub triangle_tests: u32,
}

/// Nearest hit along a ray: distance in units of the ray direction and the
/// index of the triangle in the [`TriangleStore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub t: f32,
    pub triangle: u32,
}

/// Nearest hit distance along `dir` via BVH traversal, or `None` on a miss.
pub fn intersect_bvh(bvh: &Bvh, store: &TriangleStore, origin: Vec3, dir: Vec3) -> Option<f32> {
    closest_hit(bvh, store, origin, dir).map(|hit| hit.t)
}

/// Like [`intersect_bvh`], also reporting which triangle was hit.
pub fn closest_hit(bvh: &Bvh, store: &TriangleStore, origin: Vec3, dir: Vec3) -> Option<RayHit> {
    intersect_bvh_with_stats(bvh, store, origin, dir).0
}

/// [`closest_hit`] plus traversal counters.
pub fn intersect_bvh_with_stats(
    bvh: &Bvh,
    store: &TriangleStore,
    origin: Vec3,
    dir: Vec3,
) -> (Option<RayHit>, TraversalStats) {
    let mut stats = TraversalStats::default();
    let nodes = bvh.nodes();
    if nodes.is_empty() {
        return (None, stats);
    }

    let inv_dir = safe_inverse(dir);
    let triangles = store.triangles();
    let permutation = bvh.triangle_indices();
    let mut nearest: Option<RayHit> = None;
    let mut t_max = f32::INFINITY;
    let mut stack: Vec<u32> = Vec::with_capacity(64);
    stack.push(0);

    while let Some(index) = stack.pop() {
        let node = &nodes[index as usize];
        stats.nodes_visited += 1;

        let (box_min, box_max) = (
            Vec3::from_array(node.bounds_min),
            Vec3::from_array(node.bounds_max),
        );
        if !ray_aabb(origin, inv_dir, box_min, box_max, t_max) {
            continue;
        }

        if node.is_leaf() {
            for &tri in &permutation[node.triangle_range()] {
                stats.triangle_tests += 1;
                if let Some(t) = ray_triangle(origin, dir, &triangles[tri as usize]) {
                    if t < t_max {
                        t_max = t;
                        nearest = Some(RayHit { t, triangle: tri });
                    }
                }
            }
        } else {
            stack.push(node.right_child as u32);
            stack.push(node.left_child as u32);
        }
    }

    (nearest, stats)
}

/// Nearest hit by testing every triangle. Validation only.
pub fn brute_force_intersect(store: &TriangleStore, origin: Vec3, dir: Vec3) -> Option<f32> {
    store
        .triangles()
        .iter()
        .filter_map(|tri| ray_triangle(origin, dir, tri))
        .min_by(|a, b| a.total_cmp(b))
}

/// Convenience wrapper taking a [`Ray`].
pub fn cast_ray(bvh: &Bvh, store: &TriangleStore, ray: &Ray) -> Option<f32> {
    intersect_bvh(bvh, store, ray.origin, ray.direction)
}
