use crate::cpu_kernel::{CpuKernel, SurfaceResponse};
use crate::scene::ShoeboxRoom;
use crate::sink::JsonLinesSink;
use anyhow::{Context, Result, bail};
use sonray_core::math::Vec3;
use sonray_core::{
    AcousticEvent, AcousticSession, AcousticSessionDesc, AcquisitionMode, ConvergencePolicy,
    LogRecordSink, RecordSink,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

/// Simulated frame period handed to `tick`.
const FRAME: Duration = Duration::from_millis(16);
/// Host-side wait between ticks while the worker traces.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub mode: AcquisitionMode,
    pub frames: Option<u32>,
    pub rays: Option<u32>,
    pub bounces: Option<u32>,
    pub iterations: Option<u32>,
    pub converge_percent: Option<f64>,
    pub output: Option<PathBuf>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            mode: AcquisitionMode::Realtime,
            frames: None,
            rays: None,
            bounces: None,
            iterations: None,
            converge_percent: None,
            output: None,
        }
    }
}

impl DemoOptions {
    /// Parses flags following the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .with_context(|| format!("{} expects a value", flag))
            };
            match flag.as_str() {
                "--realtime" => options.mode = AcquisitionMode::Realtime,
                "--reference" => options.mode = AcquisitionMode::Reference,
                "--frames" => options.frames = Some(value()?.parse()?),
                "--rays" => options.rays = Some(value()?.parse()?),
                "--bounces" => options.bounces = Some(value()?.parse()?),
                "--iterations" => options.iterations = Some(value()?.parse()?),
                "--converge" => options.converge_percent = Some(value()?.parse()?),
                "--out" => options.output = Some(PathBuf::from(value()?)),
                other => bail!("unknown flag '{}'", other),
            }
        }
        Ok(options)
    }

    pub fn apply(&self, desc: &mut AcousticSessionDesc) {
        match self.mode {
            AcquisitionMode::Realtime => {
                if let Some(rays) = self.rays {
                    desc.realtime.ray_count = rays;
                }
                if let Some(bounces) = self.bounces {
                    desc.realtime.max_bounces = bounces;
                }
            }
            AcquisitionMode::Reference => {
                if let Some(rays) = self.rays {
                    desc.reference.ray_count = rays;
                }
                if let Some(bounces) = self.bounces {
                    desc.reference.max_bounces = bounces;
                }
            }
        }
        if let Some(frames) = self.frames {
            desc.realtime.max_frames = frames;
        }
        if let Some(iterations) = self.iterations {
            desc.reference.iterations = iterations;
        }
        if let Some(threshold_percent) = self.converge_percent {
            desc.reference.convergence = ConvergencePolicy::RelativeChange { threshold_percent };
        }
    }
}

pub fn run(options: DemoOptions) -> Result<()> {
    let room_size = Vec3::new(8.0, 3.0, 6.0);
    let mut desc = AcousticSessionDesc {
        scene_id: "shoebox-8x3x6".to_string(),
        source_position: Vec3::new(2.0, 1.5, 2.0),
        listener_position: Vec3::new(5.5, 1.5, 3.5),
        ..Default::default()
    };
    options.apply(&mut desc);

    let room = ShoeboxRoom::new(room_size)?;
    log::info!(
        "Scene '{}': {} triangles, {} mode",
        desc.scene_id,
        room.triangle_count(),
        options.mode
    );

    let sink: Box<dyn RecordSink> = match &options.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            log::info!("Writing records to {}", path.display());
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(LogRecordSink),
    };

    let kernel = CpuKernel::new(SurfaceResponse::default());
    let mut session = AcousticSession::new(desc, Box::new(room), Some(Box::new(kernel)), sink)?;
    session.set_mode(options.mode)?;

    loop {
        session.tick(FRAME)?;
        let mut exit = false;
        for event in session.poll_events() {
            log_event(&event);
            exit |= event.is_exit();
        }
        if exit {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    log::info!("Demo finished");
    Ok(())
}

fn log_event(event: &AcousticEvent) {
    match event {
        AcousticEvent::ModeChanged { mode } => log::info!("Mode changed to {}", mode),
        AcousticEvent::FrameCompleted {
            frame,
            frame_time_ms,
            metrics,
        } => log::debug!(
            "Frame {} in {:.2} ms: first reflection {:?} ms, RT60 {:?} s",
            frame,
            frame_time_ms,
            metrics.first_reflection_ms,
            metrics.rt60_s
        ),
        AcousticEvent::IterationCompleted { iteration, rt60_s } => {
            log::info!("Iteration {}: running RT60 {:?} s", iteration, rt60_s)
        }
        AcousticEvent::ReferenceCompleted {
            iterations,
            converged,
            metrics,
        } => log::info!(
            "Reference result after {} iterations (converged: {}): first reflection {:?} ms, RT60 {:?} s",
            iterations,
            converged,
            metrics.first_reflection_ms,
            metrics.rt60_s
        ),
        AcousticEvent::ReadbackFailed { mode, index, error } => {
            log::error!("{} readback #{} failed: {}", mode, index, error)
        }
        AcousticEvent::StaleCompletionDiscarded { tag } => {
            log::debug!("Stale completion discarded: {:?}", tag)
        }
        AcousticEvent::ExitRequested => log::info!("Session requested exit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_reference_flags() {
        let options = DemoOptions::parse(&args(&[
            "--reference",
            "--rays",
            "5000",
            "--iterations",
            "4",
            "--converge",
            "2.5",
        ]))
        .unwrap();
        assert_eq!(options.mode, AcquisitionMode::Reference);

        let mut desc = AcousticSessionDesc::default();
        options.apply(&mut desc);
        assert_eq!(desc.reference.ray_count, 5000);
        assert_eq!(desc.realtime.ray_count, 2048);
        assert_eq!(desc.reference.iterations, 4);
        assert_eq!(
            desc.reference.convergence,
            ConvergencePolicy::RelativeChange {
                threshold_percent: 2.5
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(DemoOptions::parse(&args(&["--frames"])).is_err());
        assert!(DemoOptions::parse(&args(&["--frames", "many"])).is_err());
        assert!(DemoOptions::parse(&args(&["--gui"])).is_err());
    }

    #[test]
    fn test_short_reference_run_completes() {
        let options = DemoOptions::parse(&args(&[
            "--reference",
            "--rays",
            "512",
            "--bounces",
            "8",
            "--iterations",
            "2",
        ]))
        .unwrap();
        run(options).unwrap();
    }
}
