//! Math types for SonRay

pub use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box; growing it by anything yields that thing's bounds.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            min: a.min(b).min(c),
            max: a.max(b).max(c),
        }
    }

    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    #[inline]
    pub fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Longest axis (0=x, 1=y, 2=z). Ties resolve toward the lower axis.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// True if `other` lies inside `self`, allowing `tolerance` of slack on every face.
    pub fn contains(&self, other: &Aabb, tolerance: f32) -> bool {
        other.min.cmpge(self.min - Vec3::splat(tolerance)).all()
            && other.max.cmple(self.max + Vec3::splat(tolerance)).all()
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A ray `origin + t * direction`. The direction need not be normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aabb_grows_to_other() {
        let mut b = Aabb::EMPTY;
        assert!(b.is_empty());
        let other = Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 3.0, 4.0));
        b.grow(&other);
        assert_eq!(b, other);
    }

    #[test]
    fn test_longest_axis() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 1);
        let cube = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(cube.longest_axis(), 0);
    }

    #[test]
    fn test_contains_with_tolerance() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let inner = Aabb::new(Vec3::splat(0.25), Vec3::splat(0.75));
        let poking = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.0 + 1e-5));
        assert!(outer.contains(&inner, 0.0));
        assert!(!outer.contains(&poking, 0.0));
        assert!(outer.contains(&poking, 1e-4));
    }

    #[test]
    fn test_ray_at() {
        let r = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(r.at(1.5), Vec3::new(0.0, 0.0, 3.0));
    }
}
