//! Impulse-response decoding and acoustic metrics.
//!
//! The compute kernel accumulates ray energy into fixed-point per-bin counters.
//! [`ImpulseResponse::from_raw`] turns those into energy, and the functions in
//! this module reduce an IR to a first-reflection time and an RT60 estimate.

mod impulse_response;
mod metrics;

pub use impulse_response::{ENERGY_SCALE, ImpulseResponse, RunningMeanIr};
pub use metrics::{
    AcousticMetrics, DIRECT_SOUND_WINDOW_MS, FIRST_REFLECTION_CONSECUTIVE_BINS, RT60_FIT_LOWER_DB,
    RT60_FIT_UPPER_DB, first_reflection_ms, rt60_seconds, schroeder_curve_db,
};
