//! SonRay: room-acoustic estimation by ray tracing a triangulated scene.
//!
//! The crate covers the host side of the pipeline:
//! - [`bvh`]: median-split BVH over world-space triangles, refit under motion
//! - [`intersect`]: ray/box and ray/triangle tests, BVH traversal and a brute-force oracle
//! - [`analysis`]: impulse-response decoding, first-reflection time and Schroeder RT60
//! - [`session`]: the acquisition state machine driving an asynchronous [`ComputeKernel`]
//!
//! The kernel itself, the scene host and the record destination are supplied by
//! the caller through the [`ComputeKernel`], [`GeometrySource`] and [`RecordSink`] traits.

pub mod analysis;
pub mod bvh;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod intersect;
pub mod kernel;
pub mod math;
pub mod record;
pub mod session;

#[cfg(test)]
mod test_support;

pub use analysis::{AcousticMetrics, ImpulseResponse, RunningMeanIr};
pub use bvh::{BVH_STRATEGY_LABEL, Bvh, BvhNode};
pub use config::{AcousticSessionDesc, ConvergencePolicy, RealtimeDesc, ReferenceDesc};
pub use error::{Result, SonrayError};
pub use events::AcousticEvent;
pub use geometry::{GeometrySource, MeshInstance, SceneGeometry, Triangle, TriangleStore};
pub use intersect::{brute_force_intersect, cast_ray, intersect_bvh};
pub use kernel::{
    AcquisitionMode, CompletionSender, ComputeKernel, DispatchParams, DispatchTag, GeometryUpload,
    KernelCompletion,
};
pub use record::{AcousticRecord, CsvRecordSink, LogRecordSink, MemoryRecordSink, RecordKind, RecordSink};
pub use session::{AcousticSession, SessionState};
