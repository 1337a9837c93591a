// THEORY:
// The `display` module defines where annotated frames go. A `DisplaySurface` shows
// frames and reports key presses; the only key the frame loop cares about is its
// exit key.

use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub trait DisplaySurface {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()>;

    /// Waits up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<i32>>;

    /// Tears down any windows. Called once by the owning `LoopContext`.
    fn close(&mut self) -> Result<()>;
}

impl<D: DisplaySurface + ?Sized> DisplaySurface for Box<D> {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        (**self).show(window, frame)
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<i32>> {
        (**self).poll_key(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A display without a window. Frames are logged and optionally written out as
/// numbered PNG snapshots; no key is ever pressed.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    output_dir: Option<PathBuf>,
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new(output_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                VisionError::display(format!("cannot create {}", dir.display()), e)
            })?;
        }
        Ok(Self {
            output_dir,
            shown: 0,
        })
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        debug!(
            window,
            frame = self.shown,
            width = frame.width(),
            height = frame.height(),
            "frame rendered"
        );
        if let Some(dir) = &self.output_dir {
            let name = format!("{}_{:06}.png", window.replace(' ', "_"), self.shown);
            frame.save_png(&dir.join(name))?;
        }
        self.shown += 1;
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<i32>> {
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
