use anyhow::{Context, Result};

use super::program::KernelLayout;
use super::ContextInit;

/// Owns the wgpu core objects used for compute.
///
/// Unlike a windowed context there is no surface: kernels render into
/// storage buffers that are read back on demand.
pub struct Gpu {
    /// Selected adapter.
    pub(super) adapter_info: wgpu::AdapterInfo,

    /// Logical device.
    pub(super) device: wgpu::Device,

    /// Command queue shared by every [`GpuQueue`](super::GpuQueue).
    pub(super) queue: wgpu::Queue,

    /// Bind group and pipeline layout every kernel is built against.
    pub(super) layout: KernelLayout,
}

impl Gpu {
    /// Creates a headless compute context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: ContextInit) -> Result<Self> {
        let ContextInit {
            backends,
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
            adapter_index,
        } = init;

        let instance = create_instance(backends);
        let adapter = match adapter_index {
            Some(index) => {
                let mut adapters = instance.enumerate_adapters(backends).await;
                if index >= adapters.len() {
                    anyhow::bail!(
                        "adapter index {index} is out of range ({} adapter(s) available)",
                        adapters.len()
                    );
                }
                adapters.swap_remove(index)
            }
            None => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await
                .context("failed to find a suitable GPU adapter")?,
        };

        let adapter_info = adapter.get_info();
        log::info!(
            "using adapter {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        let required_limits = required_limits.unwrap_or_else(|| adapter.limits());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("clam-engine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let layout = KernelLayout::new(&device);

        Ok(Self {
            adapter_info,
            device,
            queue,
            layout,
        })
    }

    /// Blocking [`new`](Self::new) for callers without an executor.
    pub fn new_blocking(init: ContextInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Adapters available on `backends`, in the order
    /// [`ContextInit::adapter_index`] refers to.
    pub async fn adapters(backends: wgpu::Backends) -> Vec<wgpu::AdapterInfo> {
        create_instance(backends)
            .enumerate_adapters(backends)
            .await
            .iter()
            .map(wgpu::Adapter::get_info)
            .collect()
    }

    pub fn adapters_blocking(backends: wgpu::Backends) -> Vec<wgpu::AdapterInfo> {
        pollster::block_on(Self::adapters(backends))
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }
}

fn create_instance(backends: wgpu::Backends) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    })
}
