use std::fmt;

/// Errors raised while building or configuring a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// An option key or value contains whitespace and cannot be passed as a
    /// compiler define. No compilation was attempted.
    InvalidOptionSyntax { key: String, value: String },
    /// The compiler rejected the source. `log` is the full build log.
    BuildFailure { log: String },
    /// The key was not declared by the kernel source.
    UnknownOption(String),
    /// The backend exposes more than one device; which one to build for is
    /// undefined.
    MultiDeviceAmbiguity { devices: usize },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptionSyntax { key, value } => write!(
                f,
                "invalid define \"{key}={value}\": define contained whitespace"
            ),
            Self::BuildFailure { log } => write!(f, "kernel build failed:\n{log}"),
            Self::UnknownOption(key) => write!(f, "kernel option `{key}` does not exist"),
            Self::MultiDeviceAmbiguity { devices } => write!(
                f,
                "compute context exposes {devices} devices; exactly one is supported"
            ),
        }
    }
}

impl std::error::Error for KernelError {}
