//! Geometry sources: where world-space triangles come from.
//!
//! Hosts usually implement [`GeometrySource`] on top of their own scene graph.
//! [`SceneGeometry`] is a self-contained source for tools and tests: each
//! [`MeshInstance`] keeps its local vertices and a world transform, and world-space
//! triangles are re-derived whenever they are requested.

use super::triangle::Triangle;
use crate::error::{Result, SonrayError};
use crate::math::{Affine3A, Vec3};

/// Supplies the current set of world-space triangles.
///
/// The session re-queries the source on every slow geometry update, before
/// recomputing bounds and refitting. The triangle count must stay the same as at
/// session creation; a changed count is rejected and the previous snapshot is kept.
pub trait GeometrySource {
    /// Clears `out` and fills it with the current world-space triangles.
    fn world_triangles(&mut self, out: &mut Vec<Triangle>) -> Result<()>;

    /// Advances any animation by `dt` seconds. Static sources ignore this.
    fn advance(&mut self, _dt: f32) {}
}

/// An indexed triangle mesh placed in the world by an affine transform.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    local_vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    transform: Affine3A,
}

impl MeshInstance {
    pub fn new(local_vertices: Vec<Vec3>, indices: Vec<[u32; 3]>, transform: Affine3A) -> Result<Self> {
        let vertex_count = local_vertices.len();
        if let Some(bad) = indices
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(SonrayError::Configuration(format!(
                "Mesh index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(Self {
            local_vertices,
            indices,
            transform,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn transform(&self) -> Affine3A {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = transform;
    }

    /// Appends this mesh's world-space triangles to `out`.
    pub fn append_world_triangles(&self, out: &mut Vec<Triangle>) {
        let world = |i: u32| self.transform.transform_point3(self.local_vertices[i as usize]);
        out.extend(
            self.indices
                .iter()
                .map(|&[a, b, c]| Triangle::new(world(a), world(b), world(c))),
        );
    }
}

/// A list of mesh instances acting as a geometry source.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    meshes: Vec<MeshInstance>,
}

impl SceneGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mesh and returns its index.
    pub fn add_mesh(&mut self, mesh: MeshInstance) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn mesh(&self, index: usize) -> Option<&MeshInstance> {
        self.meshes.get(index)
    }

    pub fn mesh_mut(&mut self, index: usize) -> Option<&mut MeshInstance> {
        self.meshes.get_mut(index)
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshInstance::triangle_count).sum()
    }
}

impl GeometrySource for SceneGeometry {
    fn world_triangles(&mut self, out: &mut Vec<Triangle>) -> Result<()> {
        out.clear();
        out.reserve(self.triangle_count());
        for mesh in &self.meshes {
            mesh.append_world_triangles(out);
        }
        Ok(())
    }
}
