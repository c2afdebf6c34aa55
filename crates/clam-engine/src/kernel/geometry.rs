/// Work partitioning for one launch.
///
/// `local` is the group size per dimension, `global` the total invocation
/// count per dimension, padded up to a multiple of `local`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LaunchGeometry<const N: usize> {
    pub local: [u32; N],
    pub global: [u32; N],
}

impl<const N: usize> LaunchGeometry<N> {
    /// Derives the group size from the device limit and pads `extent` to it.
    pub fn compute(max_group_size: u64, extent: [u32; N]) -> Self {
        Self::with_local(local_size(max_group_size), extent)
    }

    /// Pads `extent` to an already known group size.
    pub fn with_local(local: [u32; N], extent: [u32; N]) -> Self {
        let global = std::array::from_fn(|d| padded_extent(extent[d], local[d]));
        Self { local, global }
    }

    /// Number of groups per dimension.
    pub fn group_count(&self) -> [u32; N] {
        std::array::from_fn(|d| self.global[d] / self.local[d])
    }
}

/// Group size per dimension for a device accepting `max_group_size`
/// invocations per group.
///
/// Every dimension gets `floor(max_group_size^(1/N))`, i.e. the largest
/// square (cubic, ...) group that fits. This favors square shapes and does
/// not search other device capabilities.
pub fn local_size<const N: usize>(max_group_size: u64) -> [u32; N] {
    let side = integer_root(max_group_size, N as u32);
    [u32::try_from(side).unwrap_or(u32::MAX); N]
}

/// Smallest multiple of `local` that is `>= extent`.
pub fn padded_extent(extent: u32, local: u32) -> u32 {
    let local = local.max(1);
    extent.div_ceil(local) * local
}

/// `floor(value^(1/n))`, at least 1.
fn integer_root(value: u64, n: u32) -> u64 {
    if n <= 1 {
        return value.max(1);
    }
    let fits = |r: u64| r.checked_pow(n).is_some_and(|p| p <= value);
    // The float estimate can be off by one in either direction (64^(1/3)).
    let mut root = (value as f64).powf(1.0 / n as f64) as u64;
    while root > 1 && !fits(root) {
        root -= 1;
    }
    while fits(root + 1) {
        root += 1;
    }
    root.max(1)
}
