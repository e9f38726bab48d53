//! Host-side stand-in for the GPU ray-tracing kernel.
//!
//! A worker thread owns its own copy of the uploaded geometry and traces each
//! dispatch with `sonray_core`'s BVH traversal. Rays leave the source uniformly,
//! reflect specularly (with occasional diffuse scattering), lose a fixed energy
//! fraction per bounce, and deposit energy into the arrival-time bin whenever
//! a path segment passes through the listener sphere.

use crate::rng::Pcg32;
use crossbeam_channel::{Receiver, Sender, unbounded};
use sonray_core::kernel::{
    CompletionSender, ComputeKernel, DispatchParams, DispatchTag, ENERGY_SCALE, GeometryUpload,
    KernelCompletion,
};
use sonray_core::math::Vec3;
use sonray_core::{Bvh, Result, SonrayError, Triangle, TriangleStore, intersect};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Surface response applied at every bounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceResponse {
    /// Fraction of energy absorbed per reflection (0.0 - 1.0)
    pub absorption: f32,
    /// Probability that a reflection is diffuse instead of specular (0.0 - 1.0)
    pub scattering: f32,
}

impl Default for SurfaceResponse {
    fn default() -> Self {
        Self {
            absorption: 0.20,
            scattering: 0.05,
        }
    }
}

/// Offset applied along the new direction after a bounce.
const SURFACE_OFFSET: f32 = 1e-4;

enum KernelCommand {
    Upload { store: TriangleStore, bvh: Bvh },
    Clear(Vec<u32>),
    Dispatch { params: DispatchParams, tag: DispatchTag },
    Stop,
}

pub struct CpuKernel {
    surface: SurfaceResponse,
    command_sender: Sender<KernelCommand>,
    command_receiver: Option<Receiver<KernelCommand>>,
    handle: Option<JoinHandle<()>>,
    /// Set on release; the worker abandons its current batch between rays.
    cancelled: Arc<AtomicBool>,
}

impl CpuKernel {
    pub fn new(surface: SurfaceResponse) -> Self {
        let (command_sender, command_receiver) = unbounded();
        Self {
            surface,
            command_sender,
            command_receiver: Some(command_receiver),
            handle: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn send(&self, command: KernelCommand) -> Result<()> {
        self.command_sender
            .send(command)
            .map_err(|_| SonrayError::Kernel("kernel worker has stopped".into()))
    }
}

impl ComputeKernel for CpuKernel {
    fn attach(&mut self, sender: CompletionSender) {
        let Some(receiver) = self.command_receiver.take() else {
            log::warn!("CPU kernel attached twice; keeping the first completion channel");
            return;
        };
        let surface = self.surface;
        let cancelled = self.cancelled.clone();
        self.handle = Some(thread::spawn(move || {
            worker_loop(receiver, sender, surface, &cancelled);
        }));
    }

    fn upload_geometry(&mut self, upload: &GeometryUpload<'_>) -> Result<()> {
        log::debug!(
            "Uploading {} B vertices, {} B nodes, {} B indices",
            upload.vertex_bytes().len(),
            upload.node_bytes().len(),
            upload.index_bytes().len()
        );
        let triangles = upload
            .vertices
            .chunks_exact(3)
            .map(|v| {
                Triangle::new(
                    Vec3::from_array(v[0]),
                    Vec3::from_array(v[1]),
                    Vec3::from_array(v[2]),
                )
            })
            .collect();
        self.send(KernelCommand::Upload {
            store: TriangleStore::new(triangles),
            bvh: Bvh::from_parts(upload.nodes.to_vec(), upload.triangle_indices.to_vec()),
        })
    }

    fn clear_accumulation(&mut self, template: &[u32]) -> Result<()> {
        self.send(KernelCommand::Clear(template.to_vec()))
    }

    fn dispatch(&mut self, params: &DispatchParams, tag: DispatchTag) -> Result<()> {
        self.send(KernelCommand::Dispatch {
            params: *params,
            tag,
        })
    }

    fn release(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.command_sender.send(KernelCommand::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("CPU kernel worker panicked");
            }
        }
    }
}

impl Drop for CpuKernel {
    fn drop(&mut self) {
        self.release();
    }
}

fn worker_loop(
    receiver: Receiver<KernelCommand>,
    sender: CompletionSender,
    surface: SurfaceResponse,
    cancelled: &AtomicBool,
) {
    let mut scene: Option<(TriangleStore, Bvh)> = None;
    let mut accumulation: Vec<f64> = Vec::new();

    while let Ok(command) = receiver.recv() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        match command {
            KernelCommand::Upload { store, bvh } => scene = Some((store, bvh)),
            KernelCommand::Clear(template) => {
                accumulation.clear();
                accumulation.extend(template.iter().map(|&c| c as f64 / ENERGY_SCALE));
            }
            KernelCommand::Dispatch { params, tag } => {
                let result = match &scene {
                    Some((store, bvh)) => {
                        accumulation.resize(params.ir_bin_count as usize, 0.0);
                        if !trace_batch(store, bvh, &params, surface, &mut accumulation, cancelled) {
                            log::debug!("Dispatch #{} abandoned on release", tag.index);
                            break;
                        }
                        Ok(to_counters(&accumulation))
                    }
                    None => Err("dispatch before geometry upload".to_string()),
                };
                if !sender.send(KernelCompletion { tag, result }) {
                    log::debug!("Completion #{} refused, session has shut down", tag.index);
                }
            }
            KernelCommand::Stop => break,
        }
    }
}

fn to_counters(energy: &[f64]) -> Vec<u32> {
    energy
        .iter()
        .map(|&e| (e * ENERGY_SCALE).round().min(u32::MAX as f64) as u32)
        .collect()
}

/// Traces `params.ray_count` paths and adds their listener arrivals to `bins`.
///
/// Returns `false` if `cancelled` was raised before the batch finished.
fn trace_batch(
    store: &TriangleStore,
    bvh: &Bvh,
    params: &DispatchParams,
    surface: SurfaceResponse,
    bins: &mut [f64],
    cancelled: &AtomicBool,
) -> bool {
    let speed = params.speed_of_sound as f64;
    let bin_ms = params.bin_size_ms as f64;
    let max_distance = bins.len() as f64 * bin_ms / 1000.0 * speed;
    let ray_energy = 1.0 / params.ray_count as f64;

    for ray in 0..params.ray_count {
        if cancelled.load(Ordering::Relaxed) {
            return false;
        }
        let mut rng = Pcg32::new(ray as u64, params.index as u64);
        let mut origin = params.source_position;
        let mut dir = rng.unit_vector();
        let mut energy = ray_energy;
        let mut travelled = 0.0f64;

        for _ in 0..=params.max_bounces {
            let hit = intersect::closest_hit(bvh, store, origin, dir);
            let segment = hit.map_or(f32::INFINITY, |h| h.t);

            if let Some(t) = sphere_entry(origin, dir, params.listener_position, params.listener_radius)
            {
                if t <= segment {
                    let arrival_ms = (travelled + t as f64) / speed * 1000.0;
                    let bin = (arrival_ms / bin_ms) as usize;
                    if let Some(slot) = bins.get_mut(bin) {
                        *slot += energy;
                    }
                }
            }

            let Some(hit) = hit else { break };
            travelled += hit.t as f64;
            if travelled > max_distance {
                break;
            }

            let normal = store.triangles()[hit.triangle as usize].normal();
            let facing = if normal.dot(dir) > 0.0 { -normal } else { normal };
            origin += dir * hit.t;
            dir = if rng.next_f32() < surface.scattering {
                rng.hemisphere(facing)
            } else {
                dir - 2.0 * dir.dot(facing) * facing
            };
            origin += dir * SURFACE_OFFSET;
            energy *= (1.0 - surface.absorption) as f64;
        }
    }
    true
}

/// Distance along the unit direction `dir` at which the ray enters the sphere,
/// or `None` if it misses. A ray starting inside reports 0.
fn sphere_entry(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = b * b - c;
    if disc < 0.0 || b > 0.0 {
        return None;
    }
    Some(-b - disc.sqrt())
}
