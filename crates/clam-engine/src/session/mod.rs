//! Render sessions: a compiled kernel paired with its parameter source.
//!
//! A session renders interactively (one full-window dispatch per call) or
//! captures screenshots: tiled, optionally multi-frame renders read back and
//! packed into 24-bit RGB.

mod activity;
mod capture;
mod pixels;

pub use activity::{CaptureActivity, CaptureGuard};
pub use capture::{CaptureConfig, CaptureError, RenderSession};
pub use pixels::{pack_pixel, Screenshot};
