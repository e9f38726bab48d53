//! Bounding volume hierarchy over world-space triangles.
//!
//! The hierarchy is built once per scene load with a median split and then kept
//! valid under geometry motion by [`Bvh::refit`], which only rewrites bounds.
//!
//! # Layout
//!
//! Nodes live in a flat arena (`Vec<BvhNode>`) addressed by index, root at 0.
//! Leaves reference a contiguous range of the triangle index permutation rather
//! than owning triangle data. The same arrays are uploaded unchanged to the
//! compute kernel, so the node encoding (including the `-1` leaf sentinel) is part
//! of the kernel contract.
//!
//! # Invariants
//!
//! After [`Bvh::build`] and after every [`Bvh::refit`]:
//! - every internal node's box is the union of its children's boxes
//! - every leaf's box is the union of its triangles' boxes
//! - leaf ranges tile the permutation exactly once
//!
//! [`Bvh::validate`] checks all of these.

mod build;
mod node;
mod refit;

pub use build::MAX_LEAF_TRIANGLES;
pub use node::{BvhNode, LEAF_SENTINEL};

use crate::error::{Result, SonrayError};
use crate::geometry::TriangleStore;
use crate::math::Aabb;

/// Label written into acquisition records to identify the acceleration strategy.
pub const BVH_STRATEGY_LABEL: &str = "median-split-refit";

/// Node arena plus the triangle index permutation its leaves point into.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangle_indices: Vec<u32>,
}

impl Bvh {
    /// Reassembles a hierarchy from uploaded arrays. No checks; see [`Bvh::validate`].
    pub fn from_parts(nodes: Vec<BvhNode>, triangle_indices: Vec<u32>) -> Self {
        Self {
            nodes,
            triangle_indices,
        }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounds of the whole scene, or `None` for an empty hierarchy.
    pub fn root_bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(BvhNode::bounds)
    }

    /// Checks structure and bounds containment against `store`.
    pub fn validate(&self, store: &TriangleStore) -> Result<()> {
        let n = store.len();
        let fail = |msg: String| Err(SonrayError::BvhInvariant(msg));

        if n == 0 {
            if self.nodes.is_empty() && self.triangle_indices.is_empty() {
                return Ok(());
            }
            return fail("non-empty hierarchy over empty geometry".into());
        }
        if self.nodes.is_empty() || self.nodes.len() > 2 * n - 1 {
            return fail(format!(
                "node count {} outside 1..={} for {} triangles",
                self.nodes.len(),
                2 * n - 1,
                n
            ));
        }

        let mut seen_tri = vec![false; n];
        if self.triangle_indices.len() != n {
            return fail(format!(
                "permutation length {} != triangle count {}",
                self.triangle_indices.len(),
                n
            ));
        }
        for &t in &self.triangle_indices {
            let t = t as usize;
            if t >= n || std::mem::replace(&mut seen_tri[t], true) {
                return fail(format!("triangle index {} repeated or out of range", t));
            }
        }

        const TOLERANCE: f32 = 1e-5;
        let mut visited = vec![false; self.nodes.len()];
        let mut covered = vec![false; n];
        let mut stack = vec![0usize];

        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                return fail(format!("node {} reachable twice", i));
            }
            let node = &self.nodes[i];
            let bounds = node.bounds();

            if node.is_leaf() {
                if node.left_child != LEAF_SENTINEL || node.right_child != LEAF_SENTINEL {
                    return fail(format!("leaf {} has child links", i));
                }
                let range = node.triangle_range();
                if range.end > n {
                    return fail(format!("leaf {} range {:?} out of bounds", i, range));
                }
                for slot in range {
                    if std::mem::replace(&mut covered[slot], true) {
                        return fail(format!("permutation slot {} covered twice", slot));
                    }
                    let tri = self.triangle_indices[slot] as usize;
                    if !bounds.contains(store.triangle_bounds(tri), TOLERANCE) {
                        return fail(format!("leaf {} does not contain triangle {}", i, tri));
                    }
                }
            } else {
                for child in [node.left_child, node.right_child] {
                    if child <= i as i32 || child as usize >= self.nodes.len() {
                        return fail(format!("node {} has invalid child {}", i, child));
                    }
                    let child_bounds = self.nodes[child as usize].bounds();
                    if !bounds.contains(&child_bounds, TOLERANCE) {
                        return fail(format!("node {} does not contain child {}", i, child));
                    }
                    stack.push(child as usize);
                }
            }
        }

        if let Some(orphan) = visited.iter().position(|v| !v) {
            return fail(format!("node {} unreachable from root", orphan));
        }
        if let Some(gap) = covered.iter().position(|c| !c) {
            return fail(format!("permutation slot {} not covered by any leaf", gap));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::random_store;

    #[test]
    fn test_validate_accepts_built_tree() {
        let store = random_store(3, 64);
        let bvh = Bvh::build(&store);
        assert!(bvh.validate(&store).is_ok());
        assert!(bvh.root_bounds().is_some());
    }

    #[test]
    fn test_validate_detects_shrunken_box() {
        let store = random_store(3, 64);
        let mut bvh = Bvh::build(&store);
        let last = bvh.nodes.len() - 1;
        let mut b = bvh.nodes[last].bounds();
        b.max = b.min;
        bvh.nodes[last].set_bounds(b);
        assert!(matches!(
            bvh.validate(&store),
            Err(SonrayError::BvhInvariant(_))
        ));
    }

    #[test]
    fn test_validate_detects_broken_permutation() {
        let store = random_store(4, 16);
        let mut bvh = Bvh::build(&store);
        bvh.triangle_indices[0] = bvh.triangle_indices[1];
        assert!(bvh.validate(&store).is_err());
    }
}
