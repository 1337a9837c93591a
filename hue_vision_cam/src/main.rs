#[cfg(feature = "camera")]
mod camera;

use anyhow::Context;
use clap::Parser;
use hue_vision::config::{CaptureConfig, DisplayConfig};
use hue_vision::{
    Calibration, CaptureDevice, DisplaySurface, FrameLoop, HeadlessDisplay, ImageSequence,
    LoopContext, LoopSettings, LoopSummary, Mode, VisionConfig,
};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Live color-range bounding boxes (RGB, HSV) or dominant-color fill (DOM).
#[derive(Parser, Debug)]
#[command(name = "hue_vision_cam", version, about)]
struct Cli {
    /// Pipeline to run: RGB, HSV or DOM
    mode: Option<String>,
}

fn main() -> ExitCode {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "hue_vision_cam".to_string());

    // --- 1. Argument Parsing ---
    let token = match Cli::try_parse() {
        Ok(cli) => cli.mode,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => None,
    };
    let mode = match Mode::from_arg(&program, token.as_deref()) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    // --- 2. Configuration & Logging ---
    let config = match VisionConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    init_tracing(&config.log_level);

    // --- 3. Main Loop ---
    match run(mode, &config) {
        Ok(summary) => {
            info!(
                frames = summary.frames_processed,
                reason = ?summary.reason,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(mode: Mode, config: &VisionConfig) -> anyhow::Result<LoopSummary> {
    let pipeline = mode
        .build_pipeline(&Calibration::default(), &config.clustering)
        .context("cannot build pipeline")?;
    let capture = open_capture(&config.capture).context("cannot open capture source")?;
    let display = open_display(&config.display).context("cannot open display")?;

    info!(?mode, window = mode.window_name(), "starting");
    let frame_loop = FrameLoop::new(
        pipeline,
        LoopContext::new(capture, display),
        LoopSettings::from(&config.display),
    );
    frame_loop.run().context("frame loop stopped")
}

fn open_capture(config: &CaptureConfig) -> hue_vision::Result<Box<dyn CaptureDevice>> {
    match config {
        CaptureConfig::Frames { directory } => Ok(Box::new(ImageSequence::open(directory)?)),
        CaptureConfig::Camera { device_index } => open_camera(*device_index),
    }
}

#[cfg(feature = "camera")]
fn open_camera(device_index: i32) -> hue_vision::Result<Box<dyn CaptureDevice>> {
    Ok(Box::new(camera::OpenCvCamera::open(device_index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(device_index: i32) -> hue_vision::Result<Box<dyn CaptureDevice>> {
    Err(hue_vision::VisionError::capture_msg(format!(
        "camera {device_index} requested but this build has no camera support \
         (rebuild with `--features camera` or use a `frames` capture source)"
    )))
}

fn open_display(config: &DisplayConfig) -> hue_vision::Result<Box<dyn DisplaySurface>> {
    #[cfg(feature = "camera")]
    {
        if !config.headless {
            return Ok(Box::new(camera::HighGuiDisplay::new()));
        }
    }

    #[cfg(not(feature = "camera"))]
    {
        if !config.headless {
            tracing::warn!("no windowing support in this build, running headless");
        }
    }

    Ok(Box::new(HeadlessDisplay::new(config.output_dir.clone())?))
}
