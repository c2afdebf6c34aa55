//! Device abstraction used by the kernel core.
//!
//! The kernel lifecycle, dispatch coordination and capture algorithm only
//! talk to a [`ComputeBackend`]. The wgpu implementation lives in
//! [`crate::device`]; tests drive the same code with an in-memory recorder.

mod args;
mod error;

pub use args::{ArgValue, KernelArgs};
pub use error::DeviceError;

use crate::kernel::LaunchGeometry;

/// Result of one compiler invocation.
#[derive(Debug)]
pub enum Compilation<P> {
    /// The program built. `log` holds compiler diagnostics, usually empty.
    Built { program: P, log: String },
    /// The compiler rejected the source; `log` is the full build log.
    Failed { log: String },
}

/// A compute device the kernel core can build programs for and launch on.
///
/// Every method is called from whichever thread drives the kernel; programs
/// are only touched while the owning kernel's lock is held.
pub trait ComputeBackend: Send + Sync {
    /// Built program with a resolved entry point.
    type Program: Send;
    /// Device buffer of RGBA `f32` texels.
    type Buffer: Send + Sync;
    /// Command queue dispatches are enqueued on.
    type Queue: Send + Sync;

    /// Number of devices the backend would compile for.
    fn device_count(&self) -> usize;

    /// Largest work-group (invocation count) the queue's device supports.
    fn max_group_size(&self, queue: &Self::Queue) -> u64;

    /// Compiles `sources` with the `-D KEY=VALUE` option string and resolves
    /// `entry_point`.
    fn compile(&self, sources: &[String], options: &str, entry_point: &str)
        -> Compilation<Self::Program>;

    fn create_queue(&self) -> Result<Self::Queue, DeviceError>;

    /// Allocates a read/write buffer holding `texels` RGBA texels.
    fn create_buffer(&self, texels: usize) -> Result<Self::Buffer, DeviceError>;

    /// Enqueues one launch of `program` over `geometry`, shifted by `offset`.
    ///
    /// Argument 0 is `buffer`; `args` carries argument slots 1 and up. Does
    /// not wait for the device.
    fn enqueue(
        &self,
        queue: &Self::Queue,
        program: &mut Self::Program,
        buffer: &Self::Buffer,
        args: &KernelArgs,
        geometry: &LaunchGeometry<2>,
        offset: [u32; 2],
    ) -> Result<(), DeviceError>;

    /// Blocking read of the whole buffer.
    fn read_buffer(&self, queue: &Self::Queue, buffer: &Self::Buffer)
        -> Result<Vec<[f32; 4]>, DeviceError>;

    /// Waits until everything enqueued on `queue` has completed.
    fn finish(&self, queue: &Self::Queue) -> Result<(), DeviceError>;
}
