//! Headless wgpu compute device.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - turning preprocessed WGSL into validated compute programs
//! - implementing [`ComputeBackend`](crate::backend::ComputeBackend) on top of them

mod backend;
mod gpu;
mod init;
mod program;

pub use backend::{GpuBuffer, GpuQueue};
pub use gpu::Gpu;
pub use init::ContextInit;
pub use program::{check_kernel, GpuProgram, LaunchUniform};
