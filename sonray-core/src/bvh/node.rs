use crate::math::{Aabb, Vec3};
use bytemuck::{Pod, Zeroable};

/// Child index stored in both child slots of a leaf.
pub const LEAF_SENTINEL: i32 = -1;

/// GPU-facing BVH node (48 bytes, uploaded to the compute kernel verbatim).
///
/// Internal node: `left_child`/`right_child` hold node indices, `triangle_count == 0`.
/// Leaf node: both children are [`LEAF_SENTINEL`], and
/// `first_triangle..first_triangle + triangle_count` is a range of the
/// triangle index permutation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub bounds_min: [f32; 3],
    pub left_child: i32,
    pub bounds_max: [f32; 3],
    pub right_child: i32,
    pub first_triangle: u32,
    pub triangle_count: u32,
    pub _pad: [u32; 2],
}

impl BvhNode {
    pub fn leaf(bounds: Aabb, first_triangle: u32, triangle_count: u32) -> Self {
        Self {
            bounds_min: bounds.min.to_array(),
            left_child: LEAF_SENTINEL,
            bounds_max: bounds.max.to_array(),
            right_child: LEAF_SENTINEL,
            first_triangle,
            triangle_count,
            _pad: [0; 2],
        }
    }

    /// `first_triangle` keeps the start of the subtree's permutation range for
    /// diagnostics; traversal never reads it on internal nodes.
    pub fn internal(bounds: Aabb, left_child: u32, right_child: u32, first_triangle: u32) -> Self {
        Self {
            bounds_min: bounds.min.to_array(),
            left_child: left_child as i32,
            bounds_max: bounds.max.to_array(),
            right_child: right_child as i32,
            first_triangle,
            triangle_count: 0,
            _pad: [0; 2],
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.triangle_count > 0
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec3::from_array(self.bounds_min),
            Vec3::from_array(self.bounds_max),
        )
    }

    #[inline]
    pub fn set_bounds(&mut self, bounds: Aabb) {
        self.bounds_min = bounds.min.to_array();
        self.bounds_max = bounds.max.to_array();
    }

    /// Permutation range of a leaf.
    #[inline]
    pub fn triangle_range(&self) -> std::ops::Range<usize> {
        let first = self.first_triangle as usize;
        first..first + self.triangle_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_layout_is_48_bytes() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 48);
        assert_eq!(std::mem::align_of::<BvhNode>(), 4);
    }

    #[test]
    fn test_leaf_encoding() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let leaf = BvhNode::leaf(b, 8, 3);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.left_child, -1);
        assert_eq!(leaf.right_child, -1);
        assert_eq!(leaf.triangle_range(), 8..11);
        assert_eq!(leaf.bounds(), b);
    }

    #[test]
    fn test_internal_encoding() {
        let node = BvhNode::internal(Aabb::new(Vec3::ZERO, Vec3::ONE), 1, 4, 0);
        assert!(!node.is_leaf());
        assert_eq!((node.left_child, node.right_child), (1, 4));
    }

    #[test]
    fn test_node_byte_layout() {
        let nodes = [BvhNode::leaf(Aabb::new(Vec3::ZERO, Vec3::ONE), 0, 2)];
        let bytes: &[u8] = bytemuck::cast_slice(&nodes);
        assert_eq!(bytes.len(), 48);
        // left_child sits right after bounds_min
        assert_eq!(&bytes[12..16], &(-1i32).to_ne_bytes());
    }
}
