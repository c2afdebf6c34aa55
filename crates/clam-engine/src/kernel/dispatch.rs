use crate::backend::{ComputeBackend, DeviceError, KernelArgs};
use crate::params::ParameterSet;

use super::{local_size, CompiledKernel, LaunchGeometry};

/// First argument slot handed to the parameter source. Slot 0 is the output
/// buffer, slots 1 and 2 the window width and height.
pub const FIRST_PARAMETER_ARG: u32 = 3;

/// Which part of the window a dispatch renders.
///
/// The window is cut into a `count` × `count` grid; `coord` selects the cell.
/// Used to split large exports into bounded launches, not for on-screen
/// tiling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tiling {
    pub count: u32,
    pub coord: [u32; 2],
}

/// Extent and offset of one tile, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TileRegion {
    pub extent: [u32; 2],
    pub offset: [u32; 2],
}

impl Tiling {
    /// The whole window in a single launch.
    pub const FULL: Tiling = Tiling { count: 1, coord: [0, 0] };

    pub fn new(count: u32, coord: [u32; 2]) -> Self {
        Self { count, coord }
    }

    /// Region of `window` covered by this tile.
    ///
    /// Tiles are `ceil(window / count)` wide, so the last row and column may
    /// reach past the window by up to `count - 1` pixels.
    pub fn region(&self, window: [u32; 2]) -> TileRegion {
        if self.count <= 1 {
            return TileRegion { extent: window, offset: [0, 0] };
        }
        let extent = window.map(|size| size.div_ceil(self.count));
        let offset = [extent[0] * self.coord[0], extent[1] * self.coord[1]];
        TileRegion { extent, offset }
    }
}

impl<B: ComputeBackend> CompiledKernel<B> {
    /// Enqueues one launch rendering `tiling`'s part of a `window`-sized
    /// image into `buffer`.
    ///
    /// Silently does nothing while the kernel has no program (failed build or
    /// disposed). Holds the kernel lock for the whole bind + enqueue, so a
    /// concurrent rebuild can never swap the program mid-dispatch. Does not
    /// wait for the device.
    pub fn dispatch(
        &self,
        buffer: &B::Buffer,
        queue: &B::Queue,
        parameters: &dyn ParameterSet,
        window: [u32; 2],
        tiling: Tiling,
    ) -> Result<(), DeviceError> {
        let mut slot = self.lock_slot();
        let Some(instance) = slot.instance.as_mut() else {
            return Ok(());
        };

        let mut args = KernelArgs::new();
        args.set(1, window[0]);
        args.set(2, window[1]);
        parameters.apply_to_kernel(&mut args, FIRST_PARAMETER_ARG);

        let region = tiling.region(window);
        let local = *instance
            .local_size
            .get_or_insert_with(|| local_size(self.backend().max_group_size(queue)));
        let geometry = LaunchGeometry::with_local(local, region.extent);

        log::trace!(
            "dispatch tile {:?}/{}: global {:?} local {:?} offset {:?}",
            tiling.coord,
            tiling.count,
            geometry.global,
            geometry.local,
            region.offset
        );

        self.backend().enqueue(
            queue,
            &mut instance.program,
            buffer,
            &args,
            &geometry,
            region.offset,
        )
    }
}
