//! World-space triangle storage and geometry sources.

mod source;
mod triangle;

pub use source::{GeometrySource, MeshInstance, SceneGeometry};
pub use triangle::{Triangle, TriangleStore};
