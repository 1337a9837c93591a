// THEORY:
// The `Frame` module is the container every pipeline stage passes around. A frame
// is a grid of three-channel 8-bit pixels plus the `ColorSpace` those channels are
// expressed in. Storage is an `image::RgbImage`; the `Rgb` pixel type is only a
// three-byte slot here, what the bytes mean is decided by the tag.
//
// Frames are never mutated once they come out of a capture device. Conversions
// return a new frame, and annotation happens on a clone owned by the pipeline.

use crate::core_modules::color::{Color, ColorSpace};
use crate::core_modules::region::BoundingRect;
use crate::error::{Result, VisionError};
use image::{ImageEncoder, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::path::Path;

const CHANNELS: usize = 3;

/// A single video frame tagged with its color space.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: RgbImage,
    space: ColorSpace,
}

impl Frame {
    pub fn new(pixels: RgbImage, space: ColorSpace) -> Self {
        Self { pixels, space }
    }

    /// Wraps an interleaved three-channel buffer, as handed over by a capture backend.
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>, space: ColorSpace) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if bytes.len() != expected {
            return Err(VisionError::invalid_frame(format!(
                "{width}x{height} frame needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        RgbImage::from_raw(width, height, bytes)
            .map(|pixels| Self { pixels, space })
            .ok_or_else(|| VisionError::invalid_frame("buffer does not fit frame geometry"))
    }

    /// A frame where every pixel is `color`.
    pub fn filled(width: u32, height: u32, color: [u8; 3], space: ColorSpace) -> Self {
        Self {
            pixels: RgbImage::from_pixel(width, height, Rgb(color)),
            space,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, value: [u8; 3]) {
        self.pixels.put_pixel(x, y, Rgb(value));
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Converts every pixel into `to`, quantizing back to bytes.
    pub fn convert(&self, to: ColorSpace) -> Result<Frame> {
        if to == self.space {
            return Ok(self.clone());
        }
        let mut converted = RgbImage::new(self.width(), self.height());
        for (source, target) in self.pixels.pixels().zip(converted.pixels_mut()) {
            let color = Color::from_bytes(source.0, self.space).convert(to)?;
            *target = Rgb(color.to_bytes());
        }
        Ok(Frame {
            pixels: converted,
            space: to,
        })
    }

    /// Draws a one pixel wide, unfilled outline of `rect`, clipped to the frame.
    pub fn draw_outline(&mut self, rect: &BoundingRect, color: &Color) -> Result<()> {
        let paint = self.paint(color)?;
        if let Some(rect) = self.canvas_rect(rect) {
            draw_hollow_rect_mut(&mut self.pixels, rect, paint);
        }
        Ok(())
    }

    /// Fills `rect` with `color`, clipped to the frame.
    pub fn fill_rect(&mut self, rect: &BoundingRect, color: &Color) -> Result<()> {
        let paint = self.paint(color)?;
        if let Some(rect) = self.canvas_rect(rect) {
            draw_filled_rect_mut(&mut self.pixels, rect, paint);
        }
        Ok(())
    }

    /// A `size` x `size` window centered on the frame, shrunk to fit smaller frames.
    pub fn centered_window(&self, size: u32) -> Result<BoundingRect> {
        if self.width() == 0 || self.height() == 0 {
            return Err(VisionError::invalid_frame("cannot sample an empty frame"));
        }
        let width = size.min(self.width());
        let height = size.min(self.height());
        let x = (self.width() / 2).saturating_sub(width / 2).min(self.width() - width);
        let y = (self.height() / 2).saturating_sub(height / 2).min(self.height() - height);
        Ok(BoundingRect::new(x, y, width, height))
    }

    /// Flattens the pixels inside `window` in row-major order.
    pub fn samples(&self, window: &BoundingRect) -> Vec<[u8; 3]> {
        let window = window.clipped(self.width(), self.height());
        let mut samples = Vec::with_capacity(window.area() as usize);
        for y in window.y..window.y + window.height {
            for x in window.x..window.x + window.width {
                samples.push(self.pixel(x, y));
            }
        }
        samples
    }

    /// Writes the frame as an RGB PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let rgb = self.convert(ColorSpace::Rgb)?;
        let output = std::fs::File::create(path).map_err(|e| {
            VisionError::display(format!("cannot create {}", path.display()), e)
        })?;
        let encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(output));
        encoder
            .write_image(
                rgb.as_bytes(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| VisionError::display(format!("cannot encode {}", path.display()), e))
    }

    fn paint(&self, color: &Color) -> Result<Rgb<u8>> {
        Ok(Rgb(color.convert(self.space)?.to_bytes()))
    }

    /// `rect` clipped to the frame, as a drawing rectangle. `None` when nothing is visible.
    fn canvas_rect(&self, rect: &BoundingRect) -> Option<Rect> {
        let rect = rect.clipped(self.width(), self.height());
        if rect.is_empty() {
            return None;
        }
        let x = i32::try_from(rect.x).ok()?;
        let y = i32::try_from(rect.y).ok()?;
        Some(Rect::at(x, y).of_size(rect.width, rect.height))
    }
}
