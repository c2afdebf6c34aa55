use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};

use wgpu::util::DeviceExt;

use crate::backend::{Compilation, ComputeBackend, DeviceError, KernelArgs};
use crate::kernel::LaunchGeometry;

use super::program::{create_module, validate_sources};
use super::{Gpu, GpuProgram, LaunchUniform};

const TEXEL_SIZE: u64 = std::mem::size_of::<[f32; 4]>() as u64;

/// Storage buffer of RGBA `f32` texels.
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
}

/// Submission handle for one render session.
///
/// wgpu exposes a single queue per device; this wrapper tracks the last
/// submission so [`ComputeBackend::finish`] waits only for its own work.
pub struct GpuQueue {
    queue: wgpu::Queue,
    last: Mutex<Option<wgpu::SubmissionIndex>>,
}

impl GpuQueue {
    fn record(&self, index: wgpu::SubmissionIndex) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    fn last(&self) -> Option<wgpu::SubmissionIndex> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Gpu {
    fn wait(&self, index: Option<wgpu::SubmissionIndex>) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: index,
                timeout: None,
            })
            .map(drop)
            .map_err(|e| DeviceError::Poll(e.to_string()))
    }
}

impl ComputeBackend for Gpu {
    type Program = GpuProgram;
    type Buffer = GpuBuffer;
    type Queue = GpuQueue;

    fn device_count(&self) -> usize {
        1
    }

    fn max_group_size(&self, _queue: &GpuQueue) -> u64 {
        u64::from(self.device.limits().max_compute_invocations_per_workgroup)
    }

    fn compile(
        &self,
        sources: &[String],
        options: &str,
        entry_point: &str,
    ) -> Compilation<GpuProgram> {
        match validate_sources(sources, options, entry_point) {
            Ok(validated) => {
                let module = create_module(&self.device, validated.source);
                Compilation::Built {
                    program: GpuProgram::new(module, entry_point),
                    log: validated.log,
                }
            }
            Err(log) => Compilation::Failed { log },
        }
    }

    fn create_queue(&self) -> Result<GpuQueue, DeviceError> {
        Ok(GpuQueue {
            queue: self.queue.clone(),
            last: Mutex::new(None),
        })
    }

    fn create_buffer(&self, texels: usize) -> Result<GpuBuffer, DeviceError> {
        let limits = self.device.limits();
        let limit = limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size));
        let size = (texels as u64).saturating_mul(TEXEL_SIZE);
        if size == 0 || size > limit {
            return Err(DeviceError::BufferTooLarge { requested: size, limit });
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clam output buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(GpuBuffer { buffer })
    }

    fn enqueue(
        &self,
        queue: &GpuQueue,
        program: &mut GpuProgram,
        buffer: &GpuBuffer,
        args: &KernelArgs,
        geometry: &LaunchGeometry<2>,
        offset: [u32; 2],
    ) -> Result<(), DeviceError> {
        let groups = geometry.group_count();
        let limit = self.device.limits().max_compute_workgroups_per_dimension;
        if groups.iter().any(|&g| g > limit) {
            return Err(DeviceError::LaunchTooLarge { groups, limit });
        }

        let words = args.words()?;
        let args_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("clam kernel args"),
            contents: bytemuck::cast_slice(&words),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let launch = LaunchUniform {
            offset,
            global_size: geometry.global,
        };
        let launch_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("clam launch uniform"),
            contents: bytemuck::bytes_of(&launch),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clam kernel bind group"),
            layout: &self.layout.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: launch_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: args_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline = program.pipeline(&self.device, &self.layout, geometry.local);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clam dispatch encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("clam kernel pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], 1);
        }

        let index = queue.queue.submit(std::iter::once(encoder.finish()));
        queue.record(index);
        Ok(())
    }

    fn read_buffer(
        &self,
        queue: &GpuQueue,
        buffer: &GpuBuffer,
    ) -> Result<Vec<[f32; 4]>, DeviceError> {
        let size = buffer.buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clam readback buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clam readback encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        let index = queue.queue.submit(std::iter::once(encoder.finish()));
        queue.record(index.clone());

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.wait(Some(index))?;
        rx.recv()
            .map_err(|_| DeviceError::Map("map_async callback was dropped".to_string()))?
            .map_err(|e| DeviceError::Map(e.to_string()))?;

        let texels = {
            let bytes = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(&bytes)
        };
        staging.unmap();
        Ok(texels)
    }

    fn finish(&self, queue: &GpuQueue) -> Result<(), DeviceError> {
        match queue.last() {
            Some(index) => self.wait(Some(index)),
            None => Ok(()),
        }
    }
}
