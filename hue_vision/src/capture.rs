// THEORY:
// The `capture` module defines where frames come from. A `CaptureDevice` is opened
// by its constructor, hands out one frame per `read_frame` call and is released by
// `close`. `Ok(None)` means the source has run out of frames, which is distinct
// from a read failure.

use crate::core_modules::color::ColorSpace;
use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};
use std::path::{Path, PathBuf};
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

pub trait CaptureDevice {
    /// Blocks until the next frame is available.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Releases the device. Called once by the owning `LoopContext`.
    fn close(&mut self) -> Result<()>;
}

impl<C: CaptureDevice + ?Sized> CaptureDevice for Box<C> {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_frame()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Plays back the still images of a directory in file-name order, as RGB frames.
#[derive(Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    closed: bool,
}

impl ImageSequence {
    pub fn open(directory: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(directory).map_err(|e| {
            VisionError::capture(format!("cannot open frame directory {}", directory.display()), e)
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| VisionError::capture("cannot list frame directory", e))?
                .path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();

        debug!(directory = %directory.display(), frames = paths.len(), "opened image sequence");
        Ok(Self {
            paths,
            next: 0,
            closed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl CaptureDevice for ImageSequence {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Err(VisionError::capture_msg("image sequence already closed"));
        }
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path)
            .map_err(|e| VisionError::capture(format!("cannot decode {}", path.display()), e))?;
        Ok(Some(Frame::new(image.to_rgb8(), ColorSpace::Rgb)))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
