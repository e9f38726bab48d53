//! Compute dispatch interface.
//!
//! A [`ComputeKernel`] traces ray batches against an uploaded geometry snapshot
//! and reports per-bin energy counters asynchronously. The session owns the
//! receiving end of the completion channel and hands the kernel a
//! [`CompletionSender`] on attach.

mod completion;
mod upload;

pub use completion::{CompletionSender, DispatchTag, KernelCompletion, completion_channel};
pub use upload::{DispatchParams, GeometryUpload};

pub use crate::analysis::ENERGY_SCALE;

use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Which acquisition loop issued a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    Realtime,
    Reference,
}

impl AcquisitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous ray-tracing backend.
///
/// Every call returns without waiting for device work. Results come back later
/// as a [`KernelCompletion`] through the sender passed to [`ComputeKernel::attach`],
/// carrying the [`DispatchTag`] of the dispatch that produced them.
pub trait ComputeKernel {
    /// Receives the channel completions must be sent on. Called once, before any upload.
    fn attach(&mut self, sender: CompletionSender);

    /// Copies the geometry snapshot. The borrowed buffers are only valid for
    /// the duration of this call; later dispatches must use the copy.
    fn upload_geometry(&mut self, upload: &GeometryUpload<'_>) -> Result<()>;

    /// Overwrites the accumulation buffer with `template` (all zeros in practice).
    fn clear_accumulation(&mut self, template: &[u32]) -> Result<()>;

    /// Queues one ray batch. The completion's result must hold
    /// `params.ir_bin_count` counters scaled by [`ENERGY_SCALE`].
    fn dispatch(&mut self, params: &DispatchParams, tag: DispatchTag) -> Result<()>;

    /// Frees device-side buffers. In-flight work may still finish, but its
    /// completion will be refused by the closed sender.
    fn release(&mut self);
}
