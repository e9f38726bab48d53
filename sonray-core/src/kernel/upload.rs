use crate::bvh::{Bvh, BvhNode};
use crate::math::Vec3;

/// Borrowed view of one geometry snapshot in the layout the kernel reads.
///
/// Three buffers: vertex triples in original triangle order, the BVH node
/// array, and the leaf permutation mapping leaf slots to triangle indices.
#[derive(Debug, Clone, Copy)]
pub struct GeometryUpload<'a> {
    pub vertices: &'a [[f32; 3]],
    pub nodes: &'a [BvhNode],
    pub triangle_indices: &'a [u32],
}

impl<'a> GeometryUpload<'a> {
    pub fn new(vertices: &'a [[f32; 3]], bvh: &'a Bvh) -> Self {
        Self {
            vertices,
            nodes: bvh.nodes(),
            triangle_indices: bvh.triangle_indices(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.vertices)
    }

    pub fn node_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.nodes)
    }

    pub fn index_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.triangle_indices)
    }
}

/// Per-dispatch uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchParams {
    pub speed_of_sound: f32,
    pub ir_bin_count: u32,
    pub bin_size_ms: f32,
    pub ray_count: u32,
    pub max_bounces: u32,
    /// Frame index in realtime mode, iteration index in reference mode
    pub index: u32,
    pub source_position: Vec3,
    pub listener_position: Vec3,
    pub listener_radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::random_store;

    #[test]
    fn test_upload_byte_views() {
        let store = random_store(5, 12);
        let bvh = Bvh::build(&store);
        let vertices = store.vertex_triples();
        let upload = GeometryUpload::new(&vertices, &bvh);

        assert_eq!(upload.triangle_count(), 12);
        assert_eq!(upload.vertex_bytes().len(), 12 * 3 * 12);
        assert_eq!(upload.node_bytes().len(), bvh.nodes().len() * 48);
        assert_eq!(upload.index_bytes().len(), 12 * 4);
    }
}
