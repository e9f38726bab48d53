//! Event types for SonRay sessions

use crate::analysis::AcousticMetrics;
use crate::kernel::{AcquisitionMode, DispatchTag};

#[derive(Debug, Clone, PartialEq)]
pub enum AcousticEvent {
    ModeChanged {
        mode: AcquisitionMode,
    },
    FrameCompleted {
        frame: u32,
        frame_time_ms: f64,
        metrics: AcousticMetrics,
    },
    IterationCompleted {
        iteration: u32,
        rt60_s: Option<f64>,
    },
    ReferenceCompleted {
        iterations: u32,
        converged: bool,
        metrics: AcousticMetrics,
    },
    ReadbackFailed {
        mode: AcquisitionMode,
        index: u32,
        error: String,
    },
    StaleCompletionDiscarded {
        tag: DispatchTag,
    },
    /// The session has finished and the host may exit.
    ExitRequested,
}

impl AcousticEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ReadbackFailed { .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::ExitRequested)
    }
}
