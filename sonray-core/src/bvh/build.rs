// Median-split BVH construction.
//
// Plain median split: largest-extent axis of the range's bounds, unstable sort
// by centroid along that axis, cut at the index midpoint. Topology built here is
// kept for the whole scene load; motion is handled by refit.

use super::Bvh;
use super::node::BvhNode;
use crate::geometry::TriangleStore;
use crate::math::Aabb;
use bytemuck::Zeroable;

/// Ranges at or below this size become leaves.
pub const MAX_LEAF_TRIANGLES: usize = 4;

impl Bvh {
    /// Builds a hierarchy over every triangle in `store`.
    ///
    /// An empty store yields an empty node array. Node 0 is always the root.
    pub fn build(store: &TriangleStore) -> Self {
        let n = store.len();
        let mut triangle_indices: Vec<u32> = (0..n as u32).collect();
        let mut nodes = Vec::new();
        if n > 0 {
            nodes.reserve(2 * n - 1);
            build_range(&mut nodes, &mut triangle_indices, store, 0, n);
        }

        log::debug!("Built BVH: {} triangles, {} nodes", n, nodes.len());

        Self {
            nodes,
            triangle_indices,
        }
    }
}

fn range_bounds(indices: &[u32], store: &TriangleStore) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for &tri in indices {
        bounds.grow(store.triangle_bounds(tri as usize));
    }
    bounds
}

/// Builds the subtree for `indices[start..start + count]` and returns its node index.
fn build_range(
    nodes: &mut Vec<BvhNode>,
    indices: &mut [u32],
    store: &TriangleStore,
    start: usize,
    count: usize,
) -> u32 {
    // Reserve this node's slot before the children so parents precede children
    // and the root lands at index 0.
    let slot = nodes.len();
    nodes.push(BvhNode::zeroed());

    let range = &mut indices[start..start + count];
    let bounds = range_bounds(range, store);

    if count <= MAX_LEAF_TRIANGLES {
        nodes[slot] = BvhNode::leaf(bounds, start as u32, count as u32);
        return slot as u32;
    }

    let axis = bounds.longest_axis();
    range.sort_unstable_by(|&a, &b| {
        let ca = store.centroid(a as usize)[axis];
        let cb = store.centroid(b as usize)[axis];
        ca.total_cmp(&cb)
    });

    let left_count = count / 2;
    let left = build_range(nodes, indices, store, start, left_count);
    let right = build_range(nodes, indices, store, start + left_count, count - left_count);

    nodes[slot] = BvhNode::internal(bounds, left, right, start as u32);
    slot as u32
}
