//! Parameter sources.
//!
//! A parameter source supplies the scene/camera values a kernel reads after
//! its fixed arguments. Sources that animate over a multi-frame capture also
//! implement [`FrameDependent`]; which capability a source has is fixed when
//! it is wrapped in a [`ParameterSource`].

mod keyframes;
mod named;

pub use keyframes::{KeyframeError, KeyframeParameters};
pub use named::NamedParameters;

use crate::backend::KernelArgs;

/// Binds current parameter values as kernel arguments.
pub trait ParameterSet: Send {
    /// Sets arguments starting at `start_index` and returns the next free
    /// index.
    fn apply_to_kernel(&self, args: &mut KernelArgs, start_index: u32) -> u32;
}

/// A parameter set whose values depend on the animation frame.
pub trait FrameDependent: ParameterSet {
    fn set_frame(&mut self, frame: u32);
}

/// A parameter set tagged with its capabilities.
pub enum ParameterSource {
    Static(Box<dyn ParameterSet>),
    FrameDependent(Box<dyn FrameDependent>),
}

impl ParameterSource {
    pub fn fixed(parameters: impl ParameterSet + 'static) -> Self {
        Self::Static(Box::new(parameters))
    }

    pub fn animated(parameters: impl FrameDependent + 'static) -> Self {
        Self::FrameDependent(Box::new(parameters))
    }

    pub fn is_frame_dependent(&self) -> bool {
        matches!(self, Self::FrameDependent(_))
    }

    /// Forwards to [`FrameDependent::set_frame`]; no-op for static sources.
    pub fn set_frame(&mut self, frame: u32) {
        if let Self::FrameDependent(p) = self {
            p.set_frame(frame);
        }
    }
}

impl ParameterSet for ParameterSource {
    fn apply_to_kernel(&self, args: &mut KernelArgs, start_index: u32) -> u32 {
        match self {
            Self::Static(p) => p.apply_to_kernel(args, start_index),
            Self::FrameDependent(p) => p.apply_to_kernel(args, start_index),
        }
    }
}

/// Binds nothing.
impl ParameterSet for () {
    fn apply_to_kernel(&self, _args: &mut KernelArgs, start_index: u32) -> u32 {
        start_index
    }
}
