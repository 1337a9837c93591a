// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the stateless
// `core_modules` stages into the two per-frame pipelines and owns the fixed color
// calibration the command-line modes run with.
//
// - `ThresholdPipeline`: convert -> classify -> extract regions -> outline each
//   region on a copy of the original frame.
// - `DominantColorPipeline`: sample the centered window -> k-means -> fill the
//   window with the dominant centroid.
//
// Both return a `FrameReport` holding the annotated frame (still in the frame's own
// color space) and what was found. Neither carries anything from one frame to the
// next.

use crate::config::ClusteringConfig;
use crate::core_modules::cluster::{ClusterEstimator, Estimate};
use crate::core_modules::color::{Color, ColorSpace};
use crate::core_modules::contour::extract_regions;
use crate::core_modules::frame::Frame;
use crate::core_modules::range_mask::{ColorRange, classify};
use crate::core_modules::region::{BoundingRect, Region};
use crate::error::{Result, VisionError};

/// Fixed calibration constants for the command-line modes.
///
/// The target range and the reference color are written in BGR, the channel order
/// capture devices deliver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub space: ColorSpace,
    pub range_min: [u8; 3],
    pub range_max: [u8; 3],
    /// Color whose hue centers the HSV window.
    pub reference: [u8; 3],
    pub hue_half_width: u8,
    pub saturation_value_floor: u8,
    pub saturation_value_ceiling: u8,
    /// Outline color for detected regions.
    pub accent: Color,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            space: ColorSpace::Bgr,
            range_min: [200, 150, 30],
            range_max: [240, 170, 70],
            reference: [222, 161, 49],
            hue_half_width: 10,
            saturation_value_floor: 150,
            saturation_value_ceiling: 255,
            accent: Color::new([255.0, 0.0, 0.0], ColorSpace::Rgb),
        }
    }
}

impl Calibration {
    /// The target range exactly as written.
    pub fn direct_range(&self) -> Result<ColorRange> {
        ColorRange::new(self.range_min, self.range_max, self.space)
    }

    /// The HSV window around the reference color's hue.
    pub fn hue_range(&self) -> Result<ColorRange> {
        ColorRange::hue_window(
            &Color::from_bytes(self.reference, self.space),
            self.hue_half_width,
            self.saturation_value_floor,
            self.saturation_value_ceiling,
        )
    }
}

/// The pipeline selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Threshold detection on the untransformed range.
    Rgb,
    /// Threshold detection on the HSV hue window.
    Hsv,
    /// Dominant-color estimation.
    Dominant,
}

impl Mode {
    /// Case-insensitive `RGB`, `HSV` or `DOM`.
    pub fn parse(token: &str) -> Option<Mode> {
        match token.to_ascii_uppercase().as_str() {
            "RGB" => Some(Mode::Rgb),
            "HSV" => Some(Mode::Hsv),
            "DOM" => Some(Mode::Dominant),
            _ => None,
        }
    }

    /// Resolves the mode argument, or the usage error naming `program`.
    pub fn from_arg(program: &str, token: Option<&str>) -> Result<Mode> {
        token.and_then(Mode::parse).ok_or_else(|| VisionError::Usage {
            program: program.to_string(),
        })
    }

    pub fn window_name(&self) -> &'static str {
        match self {
            Mode::Rgb | Mode::Hsv => "bounded",
            Mode::Dominant => "dominant color",
        }
    }

    pub fn build_pipeline(
        &self,
        calibration: &Calibration,
        clustering: &ClusteringConfig,
    ) -> Result<Box<dyn FramePipeline>> {
        Ok(match self {
            Mode::Rgb => Box::new(ThresholdPipeline::new(
                calibration.direct_range()?,
                calibration.accent,
            )),
            Mode::Hsv => Box::new(ThresholdPipeline::new(
                calibration.hue_range()?,
                calibration.accent,
            )),
            Mode::Dominant => Box::new(DominantColorPipeline::new(
                ClusterEstimator::new(clustering.estimator_settings()),
                clustering.clusters,
                clustering.window_size,
            )),
        })
    }
}

/// What a pipeline found in one frame.
#[derive(Debug, Clone)]
pub enum Detection {
    Regions(Vec<Region>),
    DominantColor {
        window: BoundingRect,
        estimate: Estimate,
    },
}

/// The primary output of a pipeline for a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub annotated: Frame,
    pub detection: Detection,
}

pub trait FramePipeline {
    fn window_name(&self) -> &str;

    fn process(&mut self, frame: &Frame) -> Result<FrameReport>;
}

impl<P: FramePipeline + ?Sized> FramePipeline for Box<P> {
    fn window_name(&self) -> &str {
        (**self).window_name()
    }

    fn process(&mut self, frame: &Frame) -> Result<FrameReport> {
        (**self).process(frame)
    }
}

/// Bounding boxes around every region whose pixels fall inside a color range.
#[derive(Debug, Clone)]
pub struct ThresholdPipeline {
    range: ColorRange,
    accent: Color,
}

impl ThresholdPipeline {
    pub fn new(range: ColorRange, accent: Color) -> Self {
        Self { range, accent }
    }

    pub fn range(&self) -> &ColorRange {
        &self.range
    }
}

impl FramePipeline for ThresholdPipeline {
    fn window_name(&self) -> &str {
        Mode::Rgb.window_name()
    }

    fn process(&mut self, frame: &Frame) -> Result<FrameReport> {
        let working = frame.convert(self.range.space())?;
        let mask = classify(&working, &self.range)?;
        let regions = extract_regions(&mask);

        let mut annotated = frame.clone();
        for region in &regions {
            annotated.draw_outline(&region.bounds, &self.accent)?;
        }

        Ok(FrameReport {
            annotated,
            detection: Detection::Regions(regions),
        })
    }
}

/// Fills the centered sampling window with its dominant color.
pub struct DominantColorPipeline {
    estimator: ClusterEstimator,
    clusters: usize,
    window_size: u32,
}

impl DominantColorPipeline {
    pub fn new(estimator: ClusterEstimator, clusters: usize, window_size: u32) -> Self {
        Self {
            estimator,
            clusters,
            window_size,
        }
    }
}

impl FramePipeline for DominantColorPipeline {
    fn window_name(&self) -> &str {
        Mode::Dominant.window_name()
    }

    fn process(&mut self, frame: &Frame) -> Result<FrameReport> {
        let window = frame.centered_window(self.window_size)?;
        let samples = frame.samples(&window);
        let estimate = self.estimator.estimate(&samples, self.clusters)?;

        let mut annotated = frame.clone();
        annotated.fill_rect(&window, &estimate.dominant.color(frame.space()))?;

        Ok(FrameReport {
            annotated,
            detection: Detection::DominantColor { window, estimate },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustering() -> ClusteringConfig {
        ClusteringConfig {
            seed: Some(5),
            ..ClusteringConfig::default()
        }
    }

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!(Mode::parse("RGB"), Some(Mode::Rgb));
        assert_eq!(Mode::parse("hsv"), Some(Mode::Hsv));
        assert_eq!(Mode::parse("Dom"), Some(Mode::Dominant));
        assert_eq!(Mode::parse("LAB"), None);
    }

    #[test]
    fn missing_or_unknown_mode_is_a_usage_error() {
        for token in [None, Some("x"), Some("")] {
            let err = Mode::from_arg("prog", token).unwrap_err();
            assert!(matches!(err, VisionError::Usage { .. }));
            assert_eq!(err.to_string(), "Usage: prog [RGB|HSV|DOM].");
        }
    }

    #[test]
    fn rgb_mode_uses_the_untransformed_range() {
        let range = Calibration::default().direct_range().unwrap();
        assert_eq!(range.min(), [200, 150, 30]);
        assert_eq!(range.max(), [240, 170, 70]);
        assert_eq!(range.space(), ColorSpace::Bgr);
    }

    #[test]
    fn hsv_mode_uses_the_hue_window() {
        let range = Calibration::default().hue_range().unwrap();
        assert_eq!(range.min(), [91, 150, 150]);
        assert_eq!(range.max(), [111, 255, 255]);
    }

    #[test]
    fn threshold_outlines_each_blob_on_the_original_frame() {
        let mut frame = Frame::filled(20, 12, [0, 0, 0], ColorSpace::Bgr);
        for y in 2..5 {
            for x in 3..7 {
                frame.put_pixel(x, y, [220, 160, 50]);
            }
        }
        frame.put_pixel(15, 9, [210, 155, 40]);

        let mut pipeline = ThresholdPipeline::new(
            Calibration::default().direct_range().unwrap(),
            Calibration::default().accent,
        );
        let report = pipeline.process(&frame).unwrap();

        let Detection::Regions(regions) = &report.detection else {
            panic!("expected regions");
        };
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bounds, BoundingRect::new(3, 2, 4, 3));
        assert_eq!(regions[1].bounds, BoundingRect::new(15, 9, 1, 1));

        assert_eq!(report.annotated.space(), ColorSpace::Bgr);
        assert_eq!(report.annotated.pixel(3, 2), [0, 0, 255]);
        assert_eq!(report.annotated.pixel(6, 4), [0, 0, 255]);
        assert_eq!(report.annotated.pixel(15, 9), [0, 0, 255]);
        assert_eq!(report.annotated.pixel(0, 0), [0, 0, 0]);
        // The original frame is left untouched.
        assert_eq!(frame.pixel(3, 2), [220, 160, 50]);
    }

    #[test]
    fn hsv_threshold_finds_the_reference_color() {
        let mut frame = Frame::filled(10, 10, [40, 40, 40], ColorSpace::Bgr);
        for y in 4..8 {
            for x in 1..4 {
                frame.put_pixel(x, y, [222, 161, 49]);
            }
        }
        let mut pipeline = Mode::Hsv
            .build_pipeline(&Calibration::default(), &clustering())
            .unwrap();
        assert_eq!(pipeline.window_name(), "bounded");
        let report = pipeline.process(&frame).unwrap();
        let Detection::Regions(regions) = report.detection else {
            panic!("expected regions");
        };
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, BoundingRect::new(1, 4, 3, 4));
    }

    #[test]
    fn rgb_frames_are_converted_before_thresholding() {
        // BGR [220, 160, 50] seen as RGB.
        let mut frame = Frame::filled(8, 8, [0, 0, 0], ColorSpace::Rgb);
        frame.put_pixel(2, 2, [50, 160, 220]);
        let mut pipeline = Mode::Rgb
            .build_pipeline(&Calibration::default(), &clustering())
            .unwrap();
        let report = pipeline.process(&frame).unwrap();
        assert_eq!(report.annotated.space(), ColorSpace::Rgb);
        assert_eq!(report.annotated.pixel(2, 2), [255, 0, 0]);
    }

    #[test]
    fn dominant_fills_the_center_window() {
        let mut frame = Frame::filled(300, 260, [10, 200, 30], ColorSpace::Bgr);
        // A small off-color patch inside the sampling window.
        for y in 130..140 {
            for x in 150..160 {
                frame.put_pixel(x, y, [250, 250, 250]);
            }
        }
        let mut pipeline = Mode::Dominant
            .build_pipeline(&Calibration::default(), &clustering())
            .unwrap();
        assert_eq!(pipeline.window_name(), "dominant color");
        let report = pipeline.process(&frame).unwrap();

        let Detection::DominantColor { window, estimate } = &report.detection else {
            panic!("expected dominant color");
        };
        assert_eq!(*window, BoundingRect::new(50, 30, 200, 200));
        assert_eq!(estimate.dominant.count, 200 * 200 - 100);
        assert_eq!(report.annotated.pixel(150, 135), [10, 200, 30]);
        assert_eq!(report.annotated.pixel(5, 5), [10, 200, 30]);
    }

    #[test]
    fn dominant_on_an_empty_frame_is_an_invalid_frame() {
        let frame = Frame::filled(0, 0, [0, 0, 0], ColorSpace::Bgr);
        let mut pipeline = Mode::Dominant
            .build_pipeline(&Calibration::default(), &clustering())
            .unwrap();
        assert!(matches!(
            pipeline.process(&frame),
            Err(VisionError::InvalidFrame { .. })
        ));
    }
}
