//! Clam engine crate.
//!
//! This crate owns kernel compilation, launch scheduling and tiled screenshot
//! capture for GPU-rendered fractal scenes. Window handling and parameter
//! editing live in higher layers.

pub mod backend;
pub mod device;
pub mod kernel;
pub mod params;
pub mod preprocess;
pub mod session;

pub mod logging;
pub mod status;
