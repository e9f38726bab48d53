use super::Bvh;
use crate::geometry::TriangleStore;
use crate::math::Aabb;

impl Bvh {
    /// Recomputes every node's bounds from current triangle positions without
    /// touching topology. O(N) over the whole tree.
    ///
    /// Call [`TriangleStore::recompute_bounds`] first in the same update. If the
    /// store's cache is stale anyway, leaf bounds are taken from the vertices
    /// directly so the result is still correct.
    pub fn refit(&mut self, store: &TriangleStore) {
        let stale = store.is_bounds_dirty();
        if stale {
            log::warn!("BVH refit on stale triangle bounds; falling back to vertex positions");
        }

        // Builder allocates every parent before its children, so a reverse sweep
        // visits children first.
        for i in (0..self.nodes.len()).rev() {
            let node = self.nodes[i];
            let bounds = if node.is_leaf() {
                let mut b = Aabb::EMPTY;
                for &tri in &self.triangle_indices[node.triangle_range()] {
                    let tri = tri as usize;
                    if stale {
                        b.grow(&store.triangles()[tri].bounds());
                    } else {
                        b.grow(store.triangle_bounds(tri));
                    }
                }
                b
            } else {
                let left = self.nodes[node.left_child as usize].bounds();
                let right = self.nodes[node.right_child as usize].bounds();
                left.union(right)
            };
            self.nodes[i].set_bounds(bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bvh::Bvh;
    use crate::geometry::Triangle;
    use crate::math::Vec3;
    use crate::test_support::{Pcg32, random_store};

    #[test]
    fn test_refit_after_translation_shifts_every_box() {
        let mut store = random_store(7, 300);
        let mut bvh = Bvh::build(&store);
        let before: Vec<_> = bvh.nodes().iter().map(|n| n.bounds()).collect();
        let topology: Vec<_> = bvh
            .nodes()
            .iter()
            .map(|n| (n.left_child, n.right_child, n.first_triangle, n.triangle_count))
            .collect();

        let d = Vec3::new(3.5, -1.25, 10.0);
        store.translate(d);
        store.recompute_bounds();
        bvh.refit(&store);

        for (node, old) in bvh.nodes().iter().zip(&before) {
            let expected = old.translated(d);
            let got = node.bounds();
            assert!((got.min - expected.min).abs().max_element() < 1e-4);
            assert!((got.max - expected.max).abs().max_element() < 1e-4);
        }
        let after: Vec<_> = bvh
            .nodes()
            .iter()
            .map(|n| (n.left_child, n.right_child, n.first_triangle, n.triangle_count))
            .collect();
        assert_eq!(topology, after);
        bvh.validate(&store).unwrap();
    }

    #[test]
    fn test_refit_after_random_motion_restores_invariants() {
        let mut store = random_store(11, 257);
        let mut bvh = Bvh::build(&store);
        let permutation = bvh.triangle_indices().to_vec();

        let mut rng = Pcg32::new(99);
        for i in 0..store.len() {
            let tri = *store.get(i).unwrap();
            let jitter = rng.point_in_cube(4.0);
            store.set_triangle(i, Triangle::new(tri.v0 + jitter, tri.v1, tri.v2 - jitter));
        }
        store.recompute_bounds();
        bvh.refit(&store);

        assert_eq!(bvh.triangle_indices(), &permutation[..]);
        bvh.validate(&store).unwrap();
    }

    #[test]
    fn test_refit_with_stale_cache_uses_vertices() {
        let mut store = random_store(5, 40);
        let mut bvh = Bvh::build(&store);
        store.translate(Vec3::new(0.0, 100.0, 0.0));
        bvh.refit(&store);
        assert!(bvh.nodes()[0].bounds().min.y > 50.0);

        store.recompute_bounds();
        bvh.validate(&store).unwrap();
    }
}
