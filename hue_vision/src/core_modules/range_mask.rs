// THEORY:
// The RangeMask stage turns a frame into a binary picture: a pixel is "in" when all
// three of its channels fall inside an inclusive [min, max] box. The box is only
// meaningful in the color space it was written in, so a `ColorRange` carries that
// space and `classify` refuses frames expressed in any other one. Converting the
// frame first is the caller's job.

use crate::core_modules::color::{Color, ColorSpace};
use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};

/// Inclusive per-channel bounds in a given color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    min: [u8; 3],
    max: [u8; 3],
    space: ColorSpace,
}

impl ColorRange {
    pub fn new(min: [u8; 3], max: [u8; 3], space: ColorSpace) -> Result<Self> {
        if let Some(channel) = (0..3).find(|&i| min[i] > max[i]) {
            return Err(VisionError::invalid_parameter(
                format!("range channel {channel}"),
                format!("{} > {}", min[channel], max[channel]),
            ));
        }
        Ok(Self { min, max, space })
    }

    /// An HSV range `hue ± half_width` around `reference`, with saturation and value
    /// both bounded by `[floor, ceiling]`.
    pub fn hue_window(reference: &Color, half_width: u8, floor: u8, ceiling: u8) -> Result<Self> {
        let hue = reference.convert(ColorSpace::Hsv)?.to_bytes()[0];
        Self::new(
            [hue.saturating_sub(half_width), floor, floor],
            [hue.saturating_add(half_width), ceiling, ceiling],
            ColorSpace::Hsv,
        )
    }

    pub fn min(&self) -> [u8; 3] {
        self.min
    }

    pub fn max(&self) -> [u8; 3] {
        self.max
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    #[inline]
    pub fn contains(&self, pixel: [u8; 3]) -> bool {
        (0..3).all(|i| self.min[i] <= pixel[i] && pixel[i] <= self.max[i])
    }
}

/// A per-pixel boolean grid with the same geometry as the frame it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl Mask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = self.index(x, y);
        self.cells[index] = value;
    }

    #[inline]
    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Marks every pixel of `frame` whose channels all lie inside `range`.
pub fn classify(frame: &Frame, range: &ColorRange) -> Result<Mask> {
    if frame.space() != range.space() {
        return Err(VisionError::SpaceMismatch {
            actual: frame.space(),
            expected: range.space(),
        });
    }
    Ok(Mask {
        width: frame.width(),
        height: frame.height(),
        cells: frame
            .pixels()
            .pixels()
            .map(|pixel| range.contains(pixel.0))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgr_range() -> ColorRange {
        ColorRange::new([200, 150, 30], [240, 170, 70], ColorSpace::Bgr).unwrap()
    }

    #[test]
    fn three_by_three_frame_is_classified_pixel_by_pixel() {
        let mut frame = Frame::filled(3, 3, [0, 0, 0], ColorSpace::Bgr);
        frame.put_pixel(0, 0, [200, 150, 30]); // lower corner, inclusive
        frame.put_pixel(1, 1, [240, 170, 70]); // upper corner, inclusive
        frame.put_pixel(2, 2, [220, 160, 50]);
        frame.put_pixel(2, 0, [241, 160, 50]); // blue just above
        frame.put_pixel(0, 2, [220, 149, 50]); // green just below
        frame.put_pixel(1, 2, [220, 160, 71]); // red just above

        let mask = classify(&frame, &bgr_range()).unwrap();
        let expected = [
            [true, false, false],
            [false, true, false],
            [false, false, true],
        ];
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(mask.get(x, y), expected[y as usize][x as usize], "({x}, {y})");
            }
        }
    }

    #[test]
    fn frame_in_another_space_is_refused() {
        let frame = Frame::filled(3, 3, [0, 0, 0], ColorSpace::Rgb);
        let err = classify(&frame, &bgr_range()).unwrap_err();
        assert!(matches!(
            err,
            VisionError::SpaceMismatch {
                actual: ColorSpace::Rgb,
                expected: ColorSpace::Bgr
            }
        ));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(ColorRange::new([10, 0, 0], [5, 255, 255], ColorSpace::Hsv).is_err());
    }

    #[test]
    fn hue_window_brackets_the_reference_hue() {
        let reference = Color::from_bytes([222, 161, 49], ColorSpace::Bgr);
        let range = ColorRange::hue_window(&reference, 10, 150, 255).unwrap();
        assert_eq!(range.min(), [91, 150, 150]);
        assert_eq!(range.max(), [111, 255, 255]);
        assert_eq!(range.space(), ColorSpace::Hsv);
    }

    #[test]
    fn hue_window_saturates_at_the_bottom_of_the_wheel() {
        let red = Color::from_bytes([255, 0, 0], ColorSpace::Rgb);
        let range = ColorRange::hue_window(&red, 10, 100, 255).unwrap();
        assert_eq!(range.min()[0], 0);
        assert_eq!(range.max()[0], 10);
    }
}
