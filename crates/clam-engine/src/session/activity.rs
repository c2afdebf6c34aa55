use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of screenshot captures currently running.
///
/// Advisory only: it feeds "busy" indicators and never stops a capture or
/// dispatch from starting. Share one instance (behind an `Arc`) between the
/// sessions a status display should cover.
#[derive(Debug, Default)]
pub struct CaptureActivity {
    active: AtomicUsize,
}

impl CaptureActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a capture as running until the guard is dropped.
    pub fn enter(&self) -> CaptureGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        CaptureGuard { activity: self }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.active() != 0
    }
}

/// Decrements the owning [`CaptureActivity`] on drop, including on error
/// paths.
#[derive(Debug)]
pub struct CaptureGuard<'a> {
    activity: &'a CaptureActivity,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.activity.active.fetch_sub(1, Ordering::AcqRel);
    }
}
