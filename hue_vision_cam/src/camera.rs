// THEORY:
// OpenCV backends for the library's seams. `OpenCvCamera` reads BGR frames from a
// capture device and `HighGuiDisplay` shows them in HighGUI windows.

use hue_vision::{CaptureDevice, ColorSpace, DisplaySurface, Frame, Result, VisionError};
use opencv::{
    core::{self, Mat, Scalar},
    highgui,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::time::Duration;
use tracing::{debug, info};

/// A live camera. Frames come out in the device's native BGR order.
pub struct OpenCvCamera {
    cap: VideoCapture,
    device_index: i32,
    released: bool,
}

impl OpenCvCamera {
    pub fn open(device_index: i32) -> Result<Self> {
        let cap = VideoCapture::new(device_index, videoio::CAP_ANY)
            .map_err(|e| VisionError::capture(format!("cannot open camera {device_index}"), e))?;
        let opened = cap
            .is_opened()
            .map_err(|e| VisionError::capture("cannot query camera state", e))?;
        if !opened {
            return Err(VisionError::capture_msg(format!(
                "camera {device_index} is not available"
            )));
        }
        info!(device_index, "camera opened");
        Ok(Self {
            cap,
            device_index,
            released: false,
        })
    }
}

impl CaptureDevice for OpenCvCamera {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        let grabbed = self
            .cap
            .read(&mut mat)
            .map_err(|e| VisionError::capture("frame read failed", e))?;
        if !grabbed || mat.empty() {
            // A live device never ends on its own; an empty grab means it went away.
            return Err(VisionError::capture_msg(format!(
                "camera {} returned no frame",
                self.device_index
            )));
        }
        if mat.channels() != 3 {
            return Err(VisionError::invalid_frame(format!(
                "expected 3 channels, camera delivered {}",
                mat.channels()
            )));
        }
        let mat = if mat.is_continuous() {
            mat
        } else {
            mat.try_clone()
                .map_err(|e| VisionError::capture("cannot copy frame", e))?
        };
        let bytes = mat
            .data_bytes()
            .map_err(|e| VisionError::capture("cannot access frame data", e))?
            .to_vec();
        Frame::from_raw(mat.cols() as u32, mat.rows() as u32, bytes, ColorSpace::Bgr).map(Some)
    }

    fn close(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.cap
            .release()
            .map_err(|e| VisionError::capture("cannot release camera", e))?;
        debug!(device_index = self.device_index, "camera released");
        Ok(())
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// HighGUI windows, one per window name.
#[derive(Debug, Default)]
pub struct HighGuiDisplay;

impl HighGuiDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl DisplaySurface for HighGuiDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        let bgr = frame.convert(ColorSpace::Bgr)?;
        let mut mat = Mat::new_rows_cols_with_default(
            bgr.height() as i32,
            bgr.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(|e| VisionError::display("cannot allocate frame", e))?;
        mat.data_bytes_mut()
            .map_err(|e| VisionError::display("cannot access frame data", e))?
            .copy_from_slice(bgr.as_bytes());
        highgui::imshow(window, &mat).map_err(|e| VisionError::display("imshow failed", e))
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<i32>> {
        let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key =
            highgui::wait_key(millis).map_err(|e| VisionError::display("wait_key failed", e))?;
        Ok((key >= 0).then_some(key))
    }

    fn close(&mut self) -> Result<()> {
        highgui::destroy_all_windows()
            .map_err(|e| VisionError::display("cannot close windows", e))
    }
}
