use std::fmt;

/// Failure reported by a [`ComputeBackend`](super::ComputeBackend) outside
/// of compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// An argument slot below the highest bound one was never set.
    UnsetArgument(u32),
    /// Requested buffer exceeds what the device can bind.
    BufferTooLarge { requested: u64, limit: u64 },
    /// A launch needs more groups per dimension than the device allows.
    LaunchTooLarge { groups: [u32; 2], limit: u32 },
    /// Mapping a readback buffer failed.
    Map(String),
    /// Waiting on the device failed.
    Poll(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsetArgument(index) => write!(f, "kernel argument {index} was not set"),
            Self::BufferTooLarge { requested, limit } => write!(
                f,
                "buffer of {requested} bytes exceeds device limit of {limit} bytes"
            ),
            Self::LaunchTooLarge { groups, limit } => write!(
                f,
                "launch of {}x{} groups exceeds device limit of {limit} per dimension",
                groups[0], groups[1]
            ),
            Self::Map(msg) => write!(f, "buffer mapping failed: {msg}"),
            Self::Poll(msg) => write!(f, "device poll failed: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}
