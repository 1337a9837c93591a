// THEORY:
// Every fallible operation in the engine returns `VisionError`. Variants name the
// stage that failed (color conversion, frame shape, clustering, capture, display,
// configuration) so the frame loop and the binary can decide how to stop.

use crate::core_modules::color::ColorSpace;
use thiserror::Error;

/// Result type alias for hue_vision operations
pub type Result<T> = std::result::Result<T, VisionError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Every way a frame can fail to make it through the engine.
#[derive(Error, Debug)]
pub enum VisionError {
    /// A color-space conversion outside the supported set was requested
    #[error("Unsupported color-space conversion: {from} -> {to}")]
    UnsupportedSpace { from: ColorSpace, to: ColorSpace },

    /// A frame was handed to an operation expecting a different color space
    #[error("Color space mismatch: frame is {actual}, expected {expected}")]
    SpaceMismatch {
        actual: ColorSpace,
        expected: ColorSpace,
    },

    /// Frame geometry or buffer does not match what was expected
    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    /// Fewer color samples than requested clusters
    #[error("Insufficient samples: {samples} sample(s) for {clusters} cluster(s)")]
    InsufficientSamples { samples: usize, clusters: usize },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// The capture device could not be opened or read
    #[error("Capture failure: {reason}")]
    CaptureFailure {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The display surface rejected a frame or key poll
    #[error("Display failure: {reason}")]
    DisplayFailure {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Missing or unrecognised mode argument
    #[error("Usage: {program} [RGB|HSV|DOM].")]
    Usage { program: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl VisionError {
    /// Create a capture failure wrapping the backend error
    pub fn capture<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CaptureFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a capture failure without an underlying error
    pub fn capture_msg(reason: impl Into<String>) -> Self {
        Self::CaptureFailure {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a display failure wrapping the backend error
    pub fn display<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DisplayFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid frame error
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Create a configuration error wrapping the parse or I/O error
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors that end the frame loop because the video source is gone
    pub fn is_capture_failure(&self) -> bool {
        matches!(self, Self::CaptureFailure { .. })
    }
}
