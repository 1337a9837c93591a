// THEORY:
// This file is the entry point of the `hue_vision` library crate. It exposes the
// per-frame color pipelines (`pipeline`), the synchronous frame loop that drives
// them (`frame_loop`), and the seams a front-end plugs into: `CaptureDevice` for
// frame sources and `DisplaySurface` for output.
//
// The algorithmic stages (color spaces, range mask, contour extraction, k-means)
// live in `core_modules`. They are stateless and know nothing about cameras or
// windows, which is what keeps every one of them testable on synthetic frames.

pub mod capture;
pub mod config;
pub mod core_modules;
pub mod display;
pub mod error;
pub mod frame_loop;
pub mod pipeline;

pub use capture::{CaptureDevice, ImageSequence};
pub use config::VisionConfig;
pub use core_modules::color::{Color, ColorSpace};
pub use core_modules::frame::Frame;
pub use display::{DisplaySurface, HeadlessDisplay};
pub use error::{Result, VisionError};
pub use frame_loop::{FrameLoop, LoopContext, LoopSettings, LoopState, LoopSummary, StopReason};
pub use pipeline::{Calibration, FramePipeline, FrameReport, Mode};
