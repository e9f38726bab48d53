use crate::error::{Result, SonrayError};
use crate::math::{Aabb, Vec3};

/// A world-space triangle.
///
/// Degenerate triangles are accepted as-is; they simply never report a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.v0, self.v1, self.v2)
    }

    /// Vertex average.
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Unit normal following the `v0, v1, v2` winding. Zero for degenerate triangles.
    pub fn normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0).normalize_or_zero()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            v0: self.v0 + offset,
            v1: self.v1 + offset,
            v2: self.v2 + offset,
        }
    }
}

/// Fixed-size array of world-space triangles with cached per-triangle bounds.
///
/// The triangle count is fixed for the lifetime of the store; only positions move.
/// After any vertex mutation the bounds cache is stale until
/// [`TriangleStore::recompute_bounds`] runs, which must happen before a BVH refit.
#[derive(Debug, Clone, Default)]
pub struct TriangleStore {
    triangles: Vec<Triangle>,
    bounds: Vec<Aabb>,
    centroids: Vec<Vec3>,
    bounds_dirty: bool,
}

impl TriangleStore {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        let mut store = Self {
            triangles,
            bounds: Vec::new(),
            centroids: Vec::new(),
            bounds_dirty: true,
        };
        store.recompute_bounds();
        store
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn get(&self, index: usize) -> Option<&Triangle> {
        self.triangles.get(index)
    }

    /// Cached bounds of triangle `index`, as of the last `recompute_bounds`.
    #[inline]
    pub fn triangle_bounds(&self, index: usize) -> &Aabb {
        &self.bounds[index]
    }

    /// Cached centroid of triangle `index`, as of the last `recompute_bounds`.
    #[inline]
    pub fn centroid(&self, index: usize) -> Vec3 {
        self.centroids[index]
    }

    pub fn is_bounds_dirty(&self) -> bool {
        self.bounds_dirty
    }

    /// Replaces every triangle position. The count must match the store's.
    pub fn update_positions(&mut self, triangles: &[Triangle]) -> Result<()> {
        if triangles.len() != self.triangles.len() {
            return Err(SonrayError::GeometryMismatch {
                expected: self.triangles.len(),
                actual: triangles.len(),
            });
        }
        self.triangles.copy_from_slice(triangles);
        self.bounds_dirty = true;
        Ok(())
    }

    pub fn set_triangle(&mut self, index: usize, triangle: Triangle) {
        self.triangles[index] = triangle;
        self.bounds_dirty = true;
    }

    /// Moves every triangle by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for tri in &mut self.triangles {
            *tri = tri.translated(offset);
        }
        self.bounds_dirty = true;
    }

    /// Rebuilds the per-triangle min/max/centroid caches from current positions. O(N).
    pub fn recompute_bounds(&mut self) {
        self.bounds.clear();
        self.centroids.clear();
        self.bounds.reserve(self.triangles.len());
        self.centroids.reserve(self.triangles.len());
        for tri in &self.triangles {
            self.bounds.push(tri.bounds());
            self.centroids.push(tri.centroid());
        }
        self.bounds_dirty = false;
    }

    /// Flat vertex-triple buffer (`3 * len()` entries) in original triangle order.
    pub fn vertex_triples(&self) -> Vec<[f32; 3]> {
        let mut out = Vec::with_capacity(self.triangles.len() * 3);
        self.write_vertex_triples(&mut out);
        out
    }

    /// Like [`TriangleStore::vertex_triples`], reusing `out`'s allocation.
    pub fn write_vertex_triples(&self, out: &mut Vec<[f32; 3]>) {
        out.clear();
        for tri in &self.triangles {
            out.push(tri.v0.to_array());
            out.push(tri.v1.to_array());
            out.push(tri.v2.to_array());
        }
    }
}
