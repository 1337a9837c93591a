// THEORY:
// The `color` module is the ColorSpaceConverter of the engine. It owns the notion
// of a "color space" and the math that moves a color from one space to another.
//
// Key architectural principles:
// 1.  **Tagged Values**: A `Color` always carries the `ColorSpace` its channels are
//     expressed in. Nothing downstream has to remember whether a value is RGB or
//     HSV; it asks the tag.
// 2.  **Hub Conversion**: Every conversion goes through RGB. `Bgr` is a channel
//     swap, `Hsv` uses the 8-bit convention (hue in half-degrees, 0..180), and
//     `Gray` is Rec. 601 luma replicated into all three channels.
// 3.  **Lossless Singles, Quantized Frames**: Single colors keep `f32` channels,
//     so RGB -> HSV -> RGB lands back on the original byte after rounding. Whole
//     frames are quantized to bytes per pixel (see `Frame::convert`).
// 4.  **Gray Is a Sink**: Luma throws chroma away, so converting *from* `Gray` to
//     anything else is refused with `UnsupportedSpace`.

use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of 8-bit hue steps in a full turn (two degrees per step).
pub const HUE_STEPS: f32 = 180.0;

/// The coordinate system a pixel's three channels are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Rgb,
    /// Native channel order of OpenCV capture devices.
    Bgr,
    /// Hue 0..180 (half-degrees), saturation and value 0..255.
    Hsv,
    Gray,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorSpace::Rgb => "RGB",
            ColorSpace::Bgr => "BGR",
            ColorSpace::Hsv => "HSV",
            ColorSpace::Gray => "GRAY",
        };
        f.write_str(name)
    }
}

/// A single color sample with floating point channels and its color space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub channels: [f32; 3],
    pub space: ColorSpace,
}

impl Color {
    pub const fn new(channels: [f32; 3], space: ColorSpace) -> Self {
        Self { channels, space }
    }

    pub fn from_bytes(bytes: [u8; 3], space: ColorSpace) -> Self {
        Self {
            channels: bytes.map(f32::from),
            space,
        }
    }

    /// Re-expresses this color in `to`.
    pub fn convert(&self, to: ColorSpace) -> Result<Color> {
        Ok(Color {
            channels: convert_channels(self.channels, self.space, to)?,
            space: to,
        })
    }

    /// Rounds every channel to the nearest byte. Hue wraps so that 180 becomes 0.
    pub fn to_bytes(&self) -> [u8; 3] {
        let mut bytes = self.channels.map(|c| c.round().clamp(0.0, 255.0) as u8);
        if self.space == ColorSpace::Hsv && f32::from(bytes[0]) >= HUE_STEPS {
            bytes[0] = 0;
        }
        bytes
    }
}

/// Converts raw channels between color spaces.
pub fn convert_channels(channels: [f32; 3], from: ColorSpace, to: ColorSpace) -> Result<[f32; 3]> {
    if from == to {
        return Ok(channels);
    }
    let rgb = match from {
        ColorSpace::Rgb => channels,
        ColorSpace::Bgr => swap_red_blue(channels),
        ColorSpace::Hsv => hsv_to_rgb(channels),
        ColorSpace::Gray => return Err(VisionError::UnsupportedSpace { from, to }),
    };
    Ok(match to {
        ColorSpace::Rgb => rgb,
        ColorSpace::Bgr => swap_red_blue(rgb),
        ColorSpace::Hsv => rgb_to_hsv(rgb),
        ColorSpace::Gray => [luma(rgb); 3],
    })
}

fn swap_red_blue([a, b, c]: [f32; 3]) -> [f32; 3] {
    [c, b, a]
}

fn luma([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let degrees = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };

    [degrees / 2.0, saturation, max]
}

fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let chroma = v * (s / 255.0);
    let sector = ((h * 2.0) / 60.0).rem_euclid(6.0);
    let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
    let m = v - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    [r + m, g + m, b + m]
}
