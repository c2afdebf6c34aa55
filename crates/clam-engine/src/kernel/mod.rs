//! Kernel compilation and dispatch.
//!
//! - [`extract_options`] scans kernel source for tunable defines
//! - [`build`] turns sources + options into a backend program
//! - [`CompiledKernel`] owns the live program, rebuilds it in place and
//!   serializes dispatch against rebuilds
//! - [`LaunchGeometry`] and [`Tiling`] describe how a launch is partitioned

mod build;
mod compiled;
mod dispatch;
mod error;
mod extract;
mod geometry;
mod options;
mod snapshot;

pub use build::{build, ENTRY_POINT};
pub use compiled::CompiledKernel;
pub use dispatch::{TileRegion, Tiling, FIRST_PARAMETER_ARG};
pub use error::KernelError;
pub use extract::extract_options;
pub use geometry::{local_size, padded_extent, LaunchGeometry};
pub use options::{KernelOption, OptionMap};
pub use snapshot::{OptionSnapshot, RestoreReport, SnapshotError};
