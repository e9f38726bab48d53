//! Acquisition session: the state machine that drives the compute kernel.
//!
//! A session owns the triangle snapshot, its BVH, the compute kernel and the
//! record sink. The host calls [`AcousticSession::tick`] once per frame and
//! drains [`AcousticSession::poll_events`]; nothing blocks.
//!
//! # States
//!
//! `Idle -> Running(Realtime | Reference) -> Terminated`. Switching modes bumps
//! the dispatch epoch, so completions still in flight for the previous mode are
//! recognized as stale and discarded when they arrive.

mod realtime;
mod reference;


use crate::analysis::{AcousticMetrics, ImpulseResponse};
use crate::bvh::{BVH_STRATEGY_LABEL, Bvh};
use crate::config::AcousticSessionDesc;
use crate::error::{Result, SonrayError};
use crate::events::AcousticEvent;
use crate::geometry::{GeometrySource, Triangle, TriangleStore};
use crate::kernel::{
    AcquisitionMode, ComputeKernel, DispatchParams, DispatchTag, GeometryUpload, KernelCompletion,
    completion_channel,
};
use crate::record::{AcousticRecord, RecordKind, RecordSink};
use crossbeam_channel::{Receiver, Sender, unbounded};
use realtime::RealtimeLoop;
use reference::ReferenceLoop;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running(AcquisitionMode),
    Terminated,
}

/// A dispatch awaiting its completion.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    index: u32,
    dispatched_at: Instant,
}

impl InFlight {
    fn elapsed_ms(&self) -> f64 {
        self.dispatched_at.elapsed().as_secs_f64() * 1000.0
    }
}

pub struct AcousticSession {
    desc: AcousticSessionDesc,
    state: SessionState,
    geometry: Box<dyn GeometrySource>,
    kernel: Box<dyn ComputeKernel>,
    sink: Box<dyn RecordSink>,
    store: TriangleStore,
    bvh: Bvh,
    triangle_scratch: Vec<Triangle>,
    vertex_buffer: Vec<[f32; 3]>,
    /// All-zero counters written before every dispatch
    clear_template: Vec<u32>,
    /// Decoded counters of the completion being processed
    snapshot: ImpulseResponse,
    epoch: u64,
    is_running: Arc<AtomicBool>,
    completion_receiver: Receiver<KernelCompletion>,
    event_sender: Sender<AcousticEvent>,
    event_receiver: Receiver<AcousticEvent>,
    realtime: RealtimeLoop,
    reference: ReferenceLoop,
    torn_down: bool,
}

impl AcousticSession {
    /// Builds the initial snapshot and BVH, attaches the kernel and uploads the geometry.
    ///
    /// # Errors
    ///
    /// - [`SonrayError::Configuration`] if `desc` fails validation
    /// - [`SonrayError::KernelUnavailable`] if `kernel` is `None`
    /// - [`SonrayError::EmptyGeometry`] if the source yields no triangles
    pub fn new(
        desc: AcousticSessionDesc,
        mut geometry: Box<dyn GeometrySource>,
        kernel: Option<Box<dyn ComputeKernel>>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self> {
        desc.validate()?;
        let mut kernel = kernel.ok_or(SonrayError::KernelUnavailable)?;

        let mut triangle_scratch = Vec::new();
        geometry.world_triangles(&mut triangle_scratch)?;
        if triangle_scratch.is_empty() {
            return Err(SonrayError::EmptyGeometry);
        }

        let store = TriangleStore::new(triangle_scratch.clone());
        let bvh = Bvh::build(&store);
        log::info!(
            "Built BVH for scene '{}': {} triangles, {} nodes",
            desc.scene_id,
            store.len(),
            bvh.nodes().len()
        );

        let (completion_sender, completion_receiver, is_running) = completion_channel();
        kernel.attach(completion_sender);

        let (event_sender, event_receiver) = unbounded();
        let bin_size_ms = desc.bin_size_ms as f64;
        let mut session = Self {
            snapshot: ImpulseResponse::zeros(desc.ir_bin_count, bin_size_ms),
            clear_template: vec![0; desc.ir_bin_count],
            realtime: RealtimeLoop::default(),
            reference: ReferenceLoop::new(desc.ir_bin_count, bin_size_ms),
            desc,
            state: SessionState::Idle,
            geometry,
            kernel,
            sink,
            store,
            bvh,
            triangle_scratch,
            vertex_buffer: Vec::new(),
            epoch: 0,
            is_running,
            completion_receiver,
            event_sender,
            event_receiver,
            torn_down: false,
        };
        session.upload_geometry()?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn desc(&self) -> &AcousticSessionDesc {
        &self.desc
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn triangle_store(&self) -> &TriangleStore {
        &self.store
    }

    /// Current reference-mode running mean, if any iteration has completed.
    pub fn reference_mean(&self) -> Option<&ImpulseResponse> {
        self.reference.mean()
    }

    pub fn frames_completed(&self) -> u32 {
        self.realtime.frames_completed()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Switches acquisition mode, cancelling any in-flight cycle of the previous mode.
    ///
    /// Requesting the mode that is already running is a no-op.
    pub fn set_mode(&mut self, mode: AcquisitionMode) -> Result<()> {
        match self.state {
            SessionState::Terminated => {
                return Err(SonrayError::InvalidState(
                    "cannot change mode of a terminated session".into(),
                ));
            }
            SessionState::Running(current) if current == mode => return Ok(()),
            _ => {}
        }

        self.epoch += 1;
        match mode {
            AcquisitionMode::Realtime => self.realtime.reset(),
            AcquisitionMode::Reference => self.reference.reset(),
        }
        // Whichever loop was running loses its pending dispatch.
        self.realtime.cancel();
        self.reference.cancel();

        log::info!("Session '{}' entering {} mode (epoch {})", self.desc.scene_id, mode, self.epoch);
        self.state = SessionState::Running(mode);
        self.emit(AcousticEvent::ModeChanged { mode });
        Ok(())
    }

    /// Advances the active acquisition loop by one scheduler step.
    ///
    /// Errors are only returned for record-sink failures; kernel failures are
    /// reported as events.
    pub fn tick(&mut self, dt: Duration) -> Result<()> {
        match self.state {
            SessionState::Running(AcquisitionMode::Realtime) => self.tick_realtime(dt),
            SessionState::Running(AcquisitionMode::Reference) => self.tick_reference(),
            SessionState::Idle | SessionState::Terminated => Ok(()),
        }
    }

    /// Drains every event emitted since the last call.
    pub fn poll_events(&self) -> Vec<AcousticEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Terminates the session: in-flight work is abandoned, device buffers are
    /// released and the sink is closed. Idempotent.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        log::info!("Shutting down session '{}'", self.desc.scene_id);
        self.teardown();
    }

    fn emit(&self, event: AcousticEvent) {
        // The receiver lives as long as `self`.
        let _ = self.event_sender.send(event);
    }

    /// Takes every queued completion, discarding those from an earlier epoch.
    fn drain_completions(&mut self) -> Vec<KernelCompletion> {
        let mut current = Vec::new();
        while let Ok(completion) = self.completion_receiver.try_recv() {
            if completion.tag.epoch == self.epoch {
                current.push(completion);
            } else {
                self.discard_stale(completion.tag);
            }
        }
        current
    }

    fn discard_stale(&self, tag: DispatchTag) {
        log::debug!(
            "Discarding stale {} completion #{} (epoch {}, current {})",
            tag.mode,
            tag.index,
            tag.epoch,
            self.epoch
        );
        self.emit(AcousticEvent::StaleCompletionDiscarded { tag });
    }

    /// Validates a completion's payload and decodes it into `self.snapshot`.
    fn decode_completion(&mut self, completion: KernelCompletion) -> std::result::Result<(), String> {
        let counters = completion.result?;
        if counters.len() != self.desc.ir_bin_count {
            return Err(format!(
                "expected {} counters, got {}",
                self.desc.ir_bin_count,
                counters.len()
            ));
        }
        self.snapshot.decode_from(&counters);
        Ok(())
    }

    fn report_failure(&self, mode: AcquisitionMode, index: u32, error: String) {
        log::warn!("{} readback #{} failed: {}", mode, index, error);
        self.emit(AcousticEvent::ReadbackFailed { mode, index, error });
    }

    /// Re-queries the source, recomputes bounds, refits and uploads, in that order.
    ///
    /// On a triangle-count change the previous snapshot is kept.
    fn refresh_geometry(&mut self) -> Result<()> {
        self.geometry.world_triangles(&mut self.triangle_scratch)?;
        self.store.update_positions(&self.triangle_scratch)?;
        self.store.recompute_bounds();
        self.bvh.refit(&self.store);
        self.upload_geometry()
    }

    fn upload_geometry(&mut self) -> Result<()> {
        self.store.write_vertex_triples(&mut self.vertex_buffer);
        let upload = GeometryUpload::new(&self.vertex_buffer, &self.bvh);
        self.kernel.upload_geometry(&upload)
    }

    fn dispatch(&mut self, mode: AcquisitionMode, index: u32) -> Result<InFlight> {
        let (ray_count, max_bounces) = self.batch_size(mode);
        let params = DispatchParams {
            speed_of_sound: self.desc.speed_of_sound,
            ir_bin_count: self.desc.ir_bin_count as u32,
            bin_size_ms: self.desc.bin_size_ms,
            ray_count,
            max_bounces,
            index,
            source_position: self.desc.source_position,
            listener_position: self.desc.listener_position,
            listener_radius: self.desc.listener_radius,
        };
        let tag = DispatchTag {
            epoch: self.epoch,
            mode,
            index,
        };
        self.kernel.dispatch(&params, tag)?;
        Ok(InFlight {
            index,
            dispatched_at: Instant::now(),
        })
    }

    fn batch_size(&self, mode: AcquisitionMode) -> (u32, u32) {
        match mode {
            AcquisitionMode::Realtime => (self.desc.realtime.ray_count, self.desc.realtime.max_bounces),
            AcquisitionMode::Reference => {
                (self.desc.reference.ray_count, self.desc.reference.max_bounces)
            }
        }
    }

    fn write_record(
        &mut self,
        mode: AcquisitionMode,
        kind: RecordKind,
        index: u32,
        frame_time_ms: f64,
        metrics: AcousticMetrics,
    ) -> Result<()> {
        let (ray_count, max_bounces) = self.batch_size(mode);
        let record = AcousticRecord {
            scene_id: self.desc.scene_id.clone(),
            mode,
            kind,
            index,
            ray_count,
            max_bounces,
            bvh_strategy: BVH_STRATEGY_LABEL,
            frame_time_ms,
            first_reflection_ms: metrics.first_reflection_ms,
            rt60_s: metrics.rt60_s,
        };
        self.sink.write_record(&record)
    }

    /// Tears down and tells the host it may exit.
    fn finish(&mut self) {
        self.teardown();
        self.emit(AcousticEvent::ExitRequested);
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.state = SessionState::Terminated;
        self.epoch += 1;
        self.is_running.store(false, Ordering::Release);
        self.realtime.cancel();
        self.reference.cancel();

        let abandoned = self.completion_receiver.try_iter().count();
        if abandoned > 0 {
            log::debug!("Dropped {} completions during teardown", abandoned);
        }

        self.kernel.release();
        if let Err(e) = self.sink.close() {
            log::error!("Failed to close record sink: {}", e);
        }
    }
}

impl Drop for AcousticSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
