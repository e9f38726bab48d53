//! Demo scene: a closed shoebox room with a sliding reflector panel.

use sonray_core::Result;
use sonray_core::geometry::{GeometrySource, MeshInstance, SceneGeometry, Triangle};
use sonray_core::math::{Affine3A, Vec3};

const PANEL_AMPLITUDE_M: f32 = 0.75;
const PANEL_PERIOD_S: f32 = 4.0;

pub struct ShoeboxRoom {
    scene: SceneGeometry,
    panel: usize,
    panel_origin: Vec3,
    elapsed: f32,
}

impl ShoeboxRoom {
    /// Room spanning `[0, size]` on every axis, with a 1 m x 1.5 m panel hanging
    /// near the far wall.
    pub fn new(size: Vec3) -> Result<Self> {
        let mut scene = SceneGeometry::new();
        scene.add_mesh(box_mesh(size)?);

        let panel_origin = Vec3::new(size.x * 0.5, size.y * 0.5, size.z * 0.8);
        let panel = scene.add_mesh(panel_mesh(panel_origin)?);
        Ok(Self {
            scene,
            panel,
            panel_origin,
            elapsed: 0.0,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.scene.triangle_count()
    }

    fn panel_offset(&self) -> Vec3 {
        let phase = self.elapsed / PANEL_PERIOD_S * std::f32::consts::TAU;
        Vec3::new(PANEL_AMPLITUDE_M * phase.sin(), 0.0, 0.0)
    }
}

impl GeometrySource for ShoeboxRoom {
    fn world_triangles(&mut self, out: &mut Vec<Triangle>) -> Result<()> {
        self.scene.world_triangles(out)
    }

    fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        let translation = self.panel_origin + self.panel_offset();
        if let Some(panel) = self.scene.mesh_mut(self.panel) {
            panel.set_transform(Affine3A::from_translation(translation));
        }
    }
}

fn box_mesh(size: Vec3) -> Result<MeshInstance> {
    let corners = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 != 0 { size.x } else { 0.0 },
                if i & 2 != 0 { size.y } else { 0.0 },
                if i & 4 != 0 { size.z } else { 0.0 },
            )
        })
        .collect();
    // Two triangles per face.
    let faces = vec![
        [0, 1, 3],
        [0, 3, 2], // z = 0
        [4, 6, 7],
        [4, 7, 5], // z = size.z
        [0, 4, 5],
        [0, 5, 1], // y = 0
        [2, 3, 7],
        [2, 7, 6], // y = size.y
        [0, 2, 6],
        [0, 6, 4], // x = 0
        [1, 5, 7],
        [1, 7, 3], // x = size.x
    ];
    MeshInstance::new(corners, faces, Affine3A::IDENTITY)
}

fn panel_mesh(origin: Vec3) -> Result<MeshInstance> {
    let vertices = vec![
        Vec3::new(-0.5, -0.75, 0.0),
        Vec3::new(0.5, -0.75, 0.0),
        Vec3::new(0.5, 0.75, 0.0),
        Vec3::new(-0.5, 0.75, 0.0),
    ];
    MeshInstance::new(
        vertices,
        vec![[0, 1, 2], [0, 2, 3]],
        Affine3A::from_translation(origin),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_is_closed_box_plus_panel() {
        let mut room = ShoeboxRoom::new(Vec3::new(8.0, 3.0, 6.0)).unwrap();
        assert_eq!(room.triangle_count(), 14);

        let mut triangles = Vec::new();
        room.world_triangles(&mut triangles).unwrap();
        assert_eq!(triangles.len(), 14);
        assert!(triangles.iter().all(|t| t.normal().length() > 0.99));
    }

    #[test]
    fn test_advance_slides_panel_only() {
        let mut room = ShoeboxRoom::new(Vec3::new(8.0, 3.0, 6.0)).unwrap();
        let mut before = Vec::new();
        room.world_triangles(&mut before).unwrap();

        room.advance(PANEL_PERIOD_S / 4.0);
        let mut after = Vec::new();
        room.world_triangles(&mut after).unwrap();

        assert_eq!(before[..12], after[..12]);
        let dx = after[12].v0.x - before[12].v0.x;
        assert!((dx - PANEL_AMPLITUDE_M).abs() < 1e-4);
    }
}
