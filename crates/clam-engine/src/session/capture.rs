use std::fmt;
use std::sync::Arc;

use crate::backend::{ComputeBackend, DeviceError};
use crate::kernel::{CompiledKernel, Tiling};
use crate::params::ParameterSource;
use crate::status::Status;

use super::{CaptureActivity, Screenshot};

/// Shape of screenshot captures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Width / height of captured images.
    pub aspect_ratio: f64,

    /// Frames rendered into the same buffer when the parameter source is
    /// frame-dependent.
    pub frame_count: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: 16.0 / 9.0,
            frame_count: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Height or tile count is zero, or the image would be zero pixels wide.
    InvalidCaptureSize { height: u32, tile_power: u32 },
    Device(DeviceError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCaptureSize { height, tile_power } => write!(
                f,
                "cannot capture {height} pixels high in {tile_power}x{tile_power} tiles"
            ),
            Self::Device(e) => write!(f, "capture failed: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for CaptureError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

/// A kernel and the parameter source that feeds it.
pub struct RenderSession<B: ComputeBackend> {
    kernel: CompiledKernel<B>,
    parameters: ParameterSource,
    activity: Arc<CaptureActivity>,
    config: CaptureConfig,
}

impl<B: ComputeBackend> RenderSession<B> {
    pub fn new(
        kernel: CompiledKernel<B>,
        parameters: ParameterSource,
        activity: Arc<CaptureActivity>,
    ) -> Self {
        Self::with_config(kernel, parameters, activity, CaptureConfig::default())
    }

    pub fn with_config(
        kernel: CompiledKernel<B>,
        parameters: ParameterSource,
        activity: Arc<CaptureActivity>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            kernel,
            parameters,
            activity,
            config,
        }
    }

    pub fn kernel(&self) -> &CompiledKernel<B> {
        &self.kernel
    }

    pub fn parameters(&self) -> &ParameterSource {
        &self.parameters
    }

    pub fn activity(&self) -> &Arc<CaptureActivity> {
        &self.activity
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Renders the current parameters into a `window`-sized buffer in one
    /// launch. Does not wait for the device.
    pub fn render(
        &self,
        buffer: &B::Buffer,
        queue: &B::Queue,
        window: [u32; 2],
    ) -> Result<(), DeviceError> {
        self.kernel
            .dispatch(buffer, queue, &self.parameters, window, Tiling::FULL)
    }

    /// Renders a `height`-pixel-high screenshot in `tile_power` x
    /// `tile_power` tiles.
    ///
    /// A frame-dependent parameter source is stepped through every frame of
    /// [`CaptureConfig::frame_count`], all rendered into the same buffer.
    /// Every launch is enqueued without waiting; the final readback is the
    /// only synchronization point.
    pub fn capture(&mut self, height: u32, tile_power: u32) -> Result<Screenshot, CaptureError> {
        let width = (f64::from(height) * self.config.aspect_ratio) as u32;
        if height == 0 || width == 0 || tile_power == 0 {
            return Err(CaptureError::InvalidCaptureSize { height, tile_power });
        }

        let _busy = self.activity.enter();
        let status = Arc::clone(self.kernel.status());
        let backend = Arc::clone(self.kernel.backend());
        status.report(Status::Info("Rendering screenshot"));

        let queue = backend.create_queue()?;
        let buffer = backend.create_buffer(width as usize * height as usize)?;

        let frames = if self.parameters.is_frame_dependent() {
            self.config.frame_count.max(1)
        } else {
            1
        };
        let total = u64::from(frames) * u64::from(tile_power) * u64::from(tile_power);
        let mut completed = 0u64;

        log::debug!(
            "capturing {width}x{height} in {tile_power}x{tile_power} tiles over {frames} frame(s)"
        );

        for frame in 0..frames {
            self.parameters.set_frame(frame);
            for y in 0..tile_power {
                for x in 0..tile_power {
                    let tiling = Tiling::new(tile_power, [x, y]);
                    self.kernel
                        .dispatch(&buffer, &queue, &self.parameters, [width, height], tiling)?;
                    completed += 1;
                    status.report(Status::Progress((100 * completed / total) as u32));
                }
            }
        }

        let texels = backend.read_buffer(&queue, &buffer)?;
        backend.finish(&queue)?;
        drop(buffer);
        drop(queue);

        status.report(Status::Info("Saving screenshot"));
        let screenshot = Screenshot::pack(width, height, &texels);
        if screenshot.nan_count != 0 {
            let text = format!(
                "Caught {} NaN pixels while taking screenshot",
                screenshot.nan_count
            );
            status.report(Status::Warning(&text));
        }
        status.report(Status::Info("Done rendering screenshot"));
        Ok(screenshot)
    }
}
