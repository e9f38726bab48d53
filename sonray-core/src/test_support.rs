//! Deterministic scene and ray generators shared by unit tests.

use crate::geometry::{Triangle, TriangleStore};
use crate::math::Vec3;

/// PCG32 (XSH RR). Small, seedable, and good enough for randomized properties.
#[derive(Clone, Debug)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (0xda3e_39cb_94b9_5bdb << 1) | 1,
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(seed);
        rng.next_u32();
        rng
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(self.inc);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
    }

    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    pub fn point_in_cube(&mut self, half_extent: f32) -> Vec3 {
        Vec3::new(
            self.range(-half_extent, half_extent),
            self.range(-half_extent, half_extent),
            self.range(-half_extent, half_extent),
        )
    }

    /// Uniform direction on the unit sphere.
    pub fn unit_vector(&mut self) -> Vec3 {
        let z = self.range(-1.0, 1.0);
        let phi = self.range(0.0, std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), r * phi.sin(), z)
    }
}

/// `count` small triangles scattered through a cube of the given half extent.
pub fn random_triangles(rng: &mut Pcg32, count: usize, half_extent: f32) -> Vec<Triangle> {
    (0..count)
        .map(|_| {
            let center = rng.point_in_cube(half_extent);
            Triangle::new(
                center + rng.point_in_cube(1.0),
                center + rng.point_in_cube(1.0),
                center + rng.point_in_cube(1.0),
            )
        })
        .collect()
}

pub fn random_store(seed: u64, count: usize) -> TriangleStore {
    let mut rng = Pcg32::new(seed);
    TriangleStore::new(random_triangles(&mut rng, count, 10.0))
}
