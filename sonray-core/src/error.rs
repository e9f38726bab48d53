//! Error types for SonRay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonrayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scene has no triangles")]
    EmptyGeometry,

    #[error("No compute kernel attached to the session")]
    KernelUnavailable,

    #[error("Geometry mismatch: expected {expected} triangles, got {actual}")]
    GeometryMismatch { expected: usize, actual: usize },

    #[error("Compute kernel error: {0}")]
    Kernel(String),

    #[error("Record sink error: {0}")]
    Sink(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("BVH invariant violated: {0}")]
    BvhInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SonrayError>;
