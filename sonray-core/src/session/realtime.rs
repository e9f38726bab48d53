use super::{AcousticSession, InFlight};
use crate::analysis::AcousticMetrics;
use crate::error::{Result, SonrayError};
use crate::events::AcousticEvent;
use crate::kernel::AcquisitionMode;
use crate::record::RecordKind;
use std::time::Duration;

const MODE: AcquisitionMode = AcquisitionMode::Realtime;

/// Frame-driven loop: one small batch in flight at a time.
///
/// The kernel accumulation is cleared before each frame is dispatched, so a
/// frame's IR holds only the rays traced against the current snapshot.
#[derive(Debug, Default)]
pub(super) struct RealtimeLoop {
    next_frame: u32,
    frames_completed: u32,
    in_flight: Option<InFlight>,
    since_geometry_update: Duration,
}

impl RealtimeLoop {
    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(super) fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub(super) fn frames_completed(&self) -> u32 {
        self.frames_completed
    }
}

impl AcousticSession {
    pub(super) fn tick_realtime(&mut self, dt: Duration) -> Result<()> {
        for completion in self.drain_completions() {
            let tag = completion.tag;
            let in_flight = match self.realtime.in_flight {
                Some(pending) if pending.index == tag.index && tag.mode == MODE => pending,
                _ => {
                    self.discard_stale(tag);
                    continue;
                }
            };
            self.realtime.in_flight = None;

            match self.decode_completion(completion) {
                Ok(()) => {
                    let frame_time_ms = in_flight.elapsed_ms();
                    let metrics = AcousticMetrics::analyze(&self.snapshot);
                    log::debug!(
                        "Frame {}: {:.2} ms, first reflection {:?} ms, RT60 {:?} s",
                        tag.index,
                        frame_time_ms,
                        metrics.first_reflection_ms,
                        metrics.rt60_s
                    );
                    self.realtime.frames_completed += 1;
                    self.write_record(MODE, RecordKind::Frame, tag.index, frame_time_ms, metrics)?;
                    self.emit(AcousticEvent::FrameCompleted {
                        frame: tag.index,
                        frame_time_ms,
                        metrics,
                    });
                }
                Err(error) => self.report_failure(MODE, tag.index, error),
            }
        }

        self.geometry.advance(dt.as_secs_f32());
        self.realtime.since_geometry_update += dt;
        if self.realtime.since_geometry_update >= self.desc.realtime.geometry_update_interval {
            self.realtime.since_geometry_update = Duration::ZERO;
            match self.refresh_geometry() {
                Ok(()) => {}
                Err(e @ SonrayError::GeometryMismatch { .. }) => {
                    log::warn!("Geometry update rejected, keeping previous snapshot: {}", e);
                }
                Err(e) => log::warn!("Geometry update failed: {}", e),
            }
        }

        if self.realtime.next_frame >= self.desc.realtime.max_frames {
            log::info!(
                "Realtime run finished: {} of {} frames completed",
                self.realtime.frames_completed,
                self.desc.realtime.max_frames
            );
            self.finish();
            return Ok(());
        }

        if self.realtime.in_flight.is_none() {
            let frame = self.realtime.next_frame;
            self.realtime.next_frame += 1;
            if let Err(e) = self.kernel.clear_accumulation(&self.clear_template) {
                self.report_failure(MODE, frame, e.to_string());
                return Ok(());
            }
            match self.dispatch(MODE, frame) {
                Ok(pending) => self.realtime.in_flight = Some(pending),
                Err(e) => self.report_failure(MODE, frame, e.to_string()),
            }
        }
        Ok(())
    }
}
