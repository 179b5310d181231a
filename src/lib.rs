//! Multi-camera hand landmark reconciliation.
//!
//! This crate takes per-frame hand detections from every camera of a multi-camera capture,
//! resolves them into a fixed right/left slot layout, enforces the known hand configuration of
//! the scene, and renders a synchronized multi-camera visualization.
//!
//! The stages, in the order data flows through them:
//!
//! - [`detection`]: the [`HandDetector`][detection::HandDetector] interface to the external
//!   landmark detector.
//! - [`resolve`]: assigns raw detections to the right/left slots of a [`FrameMarks`].
//! - [`sequence`]: runs a detector over one camera's frames, strictly in order.
//! - [`orchestrator`]: runs one sequence per camera on a bounded [`pool::WorkerPool`].
//! - [`canonical`]: applies the scene's [`HandSides`] to the collected results.
//! - [`archive`]: persists the results as a compressed `.npz` archive.
//! - [`visualize`]: renders per-frame mosaics and encodes them into a video.
//!
//! [`pipeline::run`] wires all of them together.
//!
//! # Environment Variables
//!
//! * `HANDMARKS_WORKERS`: overrides the number of concurrently processed cameras (the default is
//!   [`pipeline::DEFAULT_WORKERS`]).
//! * `HANDMARKS_FFMPEG`: path to the `ffmpeg` binary used by [`video::FfmpegEncoder`]. Defaults to
//!   `ffmpeg` from `PATH`.
//!
//! [`FrameMarks`]: landmark::FrameMarks
//! [`HandSides`]: hand::HandSides

use log::LevelFilter;

pub mod archive;
pub mod canonical;
pub mod detection;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod mosaic;
pub mod orchestrator;
pub mod overlay;
pub mod pipeline;
pub mod pool;
pub mod resolve;
pub mod sequence;
pub mod source;
pub mod timer;
pub mod video;
pub mod visualize;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `handmarks` will log at *debug* level. `RUST_LOG` can be used to
/// override this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
