use super::{AcousticSession, InFlight};
use crate::analysis::{AcousticMetrics, ImpulseResponse, RunningMeanIr, rt60_seconds};
use crate::error::Result;
use crate::events::AcousticEvent;
use crate::kernel::AcquisitionMode;
use crate::record::RecordKind;
use std::time::Instant;

const MODE: AcquisitionMode = AcquisitionMode::Reference;

/// Bounded iterative sampling: clear, dispatch, wait, accumulate.
#[derive(Debug)]
pub(super) struct ReferenceLoop {
    accumulator: RunningMeanIr,
    next_iteration: u32,
    in_flight: Option<InFlight>,
    previous_rt60: Option<f64>,
    started_at: Option<Instant>,
}

impl ReferenceLoop {
    pub(super) fn new(bin_count: usize, bin_size_ms: f64) -> Self {
        Self {
            accumulator: RunningMeanIr::new(bin_count, bin_size_ms),
            next_iteration: 0,
            in_flight: None,
            previous_rt60: None,
            started_at: None,
        }
    }

    pub(super) fn reset(&mut self) {
        self.accumulator.reset();
        self.next_iteration = 0;
        self.in_flight = None;
        self.previous_rt60 = None;
        self.started_at = None;
    }

    pub(super) fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub(super) fn mean(&self) -> Option<&ImpulseResponse> {
        (self.accumulator.count() > 0).then(|| self.accumulator.mean())
    }
}

impl AcousticSession {
    pub(super) fn tick_reference(&mut self) -> Result<()> {
        for completion in self.drain_completions() {
            let tag = completion.tag;
            let in_flight = match self.reference.in_flight {
                Some(pending) if pending.index == tag.index && tag.mode == MODE => pending,
                _ => {
                    self.discard_stale(tag);
                    continue;
                }
            };
            self.reference.in_flight = None;

            if let Err(error) = self.decode_completion(completion) {
                self.abort_reference(tag.index, error);
                return Ok(());
            }
            if let Err(e) = self.reference.accumulator.accumulate(&self.snapshot) {
                self.abort_reference(tag.index, e.to_string());
                return Ok(());
            }

            let mean = self.reference.accumulator.mean();
            let rt60_s = rt60_seconds(mean.energy(), mean.bin_size_ms());
            let metrics = AcousticMetrics {
                first_reflection_ms: None,
                rt60_s,
            };
            let frame_time_ms = in_flight.elapsed_ms();
            log::debug!(
                "Reference iteration {}: {:.2} ms, running RT60 {:?} s",
                tag.index,
                frame_time_ms,
                rt60_s
            );
            self.write_record(MODE, RecordKind::Iteration, tag.index, frame_time_ms, metrics)?;
            self.emit(AcousticEvent::IterationCompleted {
                iteration: tag.index,
                rt60_s,
            });

            let converged = self
                .desc
                .reference
                .convergence
                .is_converged(self.reference.previous_rt60, rt60_s);
            self.reference.previous_rt60 = rt60_s;
            self.reference.next_iteration += 1;

            if converged || self.reference.next_iteration >= self.desc.reference.iterations {
                return self.complete_reference(converged);
            }
        }

        if self.reference.in_flight.is_none() {
            self.start_iteration();
        }
        Ok(())
    }

    fn start_iteration(&mut self) {
        let iteration = self.reference.next_iteration;
        self.reference.started_at.get_or_insert_with(Instant::now);

        if let Err(e) = self.kernel.clear_accumulation(&self.clear_template) {
            self.abort_reference(iteration, e.to_string());
            return;
        }
        match self.dispatch(MODE, iteration) {
            Ok(pending) => self.reference.in_flight = Some(pending),
            Err(e) => self.abort_reference(iteration, e.to_string()),
        }
    }

    fn complete_reference(&mut self, converged: bool) -> Result<()> {
        let iterations = self.reference.accumulator.count();
        let metrics = AcousticMetrics::analyze(self.reference.accumulator.mean());
        let total_ms = self
            .reference
            .started_at
            .map_or(0.0, |t| t.elapsed().as_secs_f64() * 1000.0);

        log::info!(
            "Reference run finished after {} iterations{}: first reflection {:?} ms, RT60 {:?} s",
            iterations,
            if converged { " (converged)" } else { "" },
            metrics.first_reflection_ms,
            metrics.rt60_s
        );

        let written = self.write_record(MODE, RecordKind::Summary, iterations, total_ms, metrics);
        self.emit(AcousticEvent::ReferenceCompleted {
            iterations,
            converged,
            metrics,
        });
        self.finish();
        written
    }

    /// Abandons the run without writing any partial metric.
    fn abort_reference(&mut self, iteration: u32, error: String) {
        log::error!("Aborting reference run at iteration {}", iteration);
        self.report_failure(MODE, iteration, error);
        self.finish();
    }
}
