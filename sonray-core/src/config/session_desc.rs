use crate::error::{Result, SonrayError};
use crate::math::Vec3;
use std::time::Duration;

/// Configuration descriptor for an acquisition session
#[derive(Debug, Clone)]
pub struct AcousticSessionDesc {
    /// Identifier written into every record (usually the scene name)
    pub scene_id: String,
    /// Speed of sound in meters per second
    pub speed_of_sound: f32,
    /// Number of impulse-response bins produced by the kernel
    pub ir_bin_count: usize,
    /// Duration of one IR bin in milliseconds
    pub bin_size_ms: f32,
    /// Sound source position in world space
    pub source_position: Vec3,
    /// Listener (receiver sphere) center in world space
    pub listener_position: Vec3,
    /// Receiver sphere radius in meters
    pub listener_radius: f32,
    pub realtime: RealtimeDesc,
    pub reference: ReferenceDesc,
}

impl Default for AcousticSessionDesc {
    fn default() -> Self {
        Self {
            scene_id: "default".to_string(),
            speed_of_sound: 343.0,
            ir_bin_count: 1000,
            bin_size_ms: 1.0,
            source_position: Vec3::new(0.0, 1.5, 0.0),
            listener_position: Vec3::new(2.0, 1.5, 0.0),
            listener_radius: 0.5,
            realtime: RealtimeDesc::default(),
            reference: ReferenceDesc::default(),
        }
    }
}

impl AcousticSessionDesc {
    /// Rejects settings that would make every dispatch meaningless.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(SonrayError::Configuration(msg.to_string()));

        if self.ir_bin_count == 0 {
            return bad("ir_bin_count must be positive");
        }
        if !(self.bin_size_ms > 0.0) {
            return bad("bin_size_ms must be positive");
        }
        if !(self.speed_of_sound > 0.0) {
            return bad("speed_of_sound must be positive");
        }
        if !(self.listener_radius > 0.0) {
            return bad("listener_radius must be positive");
        }
        if self.realtime.ray_count == 0 || self.reference.ray_count == 0 {
            return bad("ray_count must be positive in both modes");
        }
        if self.realtime.max_frames == 0 {
            return bad("realtime.max_frames must be positive");
        }
        if self.reference.iterations == 0 {
            return bad("reference.iterations must be positive");
        }
        if let ConvergencePolicy::RelativeChange { threshold_percent } = self.reference.convergence {
            if !(threshold_percent > 0.0) {
                return bad("convergence threshold must be positive");
            }
        }
        Ok(())
    }
}

/// Continuous low-latency acquisition, one small ray batch per frame
#[derive(Debug, Clone)]
pub struct RealtimeDesc {
    pub ray_count: u32,
    pub max_bounces: u32,
    /// The session force-terminates after this many frames
    pub max_frames: u32,
    /// Period of the slow geometry refresh (re-query, refit, upload)
    pub geometry_update_interval: Duration,
}

impl Default for RealtimeDesc {
    fn default() -> Self {
        Self {
            ray_count: 2048,
            max_bounces: 16,
            max_frames: 300,
            geometry_update_interval: Duration::from_millis(100),
        }
    }
}

/// High-sample-count acquisition, averaged over a fixed number of iterations
#[derive(Debug, Clone)]
pub struct ReferenceDesc {
    pub ray_count: u32,
    pub max_bounces: u32,
    pub iterations: u32,
    pub convergence: ConvergencePolicy,
}

impl Default for ReferenceDesc {
    fn default() -> Self {
        Self {
            ray_count: 262_144,
            max_bounces: 64,
            iterations: 10,
            convergence: ConvergencePolicy::Disabled,
        }
    }
}

/// Optional early stop for reference runs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConvergencePolicy {
    /// Run every configured iteration
    #[default]
    Disabled,
    /// Stop once two consecutive RT60 estimates differ by less than this percentage
    RelativeChange { threshold_percent: f64 },
}

impl ConvergencePolicy {
    /// True if moving from `previous` to `current` counts as converged.
    pub fn is_converged(&self, previous: Option<f64>, current: Option<f64>) -> bool {
        match (self, previous, current) {
            (Self::RelativeChange { threshold_percent }, Some(prev), Some(cur)) if prev > 0.0 => {
                ((cur - prev).abs() / prev) * 100.0 < *threshold_percent
            }
            _ => false,
        }
    }
}
