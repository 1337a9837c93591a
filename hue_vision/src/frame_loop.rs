// THEORY:
// The `FrameLoop` is the orchestrator. One tick is strictly sequential: read one
// frame (blocking), run the selected pipeline, show the annotated frame, poll for
// the exit key. Nothing is queued, so a slow pipeline simply lowers the frame rate.
//
// Resources live in a `LoopContext` that owns the capture device and the display.
// The context is acquired when constructed and released exactly once, either by the
// loop on its way out (exit key, end of stream, any error) or by `Drop` if the loop
// is abandoned half way.

use crate::capture::CaptureDevice;
use crate::config::DisplayConfig;
use crate::display::DisplaySurface;
use crate::error::Result;
use crate::pipeline::{Detection, FramePipeline};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why the loop left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The exit key was pressed.
    ExitRequested,
    /// The capture device has no more frames.
    EndOfStream,
    /// Capture, processing or display failed; the error was returned to the caller.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_processed: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub exit_key: i32,
    pub poll_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&DisplayConfig::default())
    }
}

impl From<&DisplayConfig> for LoopSettings {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            exit_key: config.exit_key,
            poll_timeout: config.poll_timeout(),
        }
    }
}

/// Exclusive owner of the capture device and display surface.
pub struct LoopContext<C: CaptureDevice, D: DisplaySurface> {
    capture: C,
    display: D,
    released: bool,
}

impl<C: CaptureDevice, D: DisplaySurface> LoopContext<C, D> {
    pub fn new(capture: C, display: D) -> Self {
        Self {
            capture,
            display,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Closes the capture device and the display. Later calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.capture.close() {
            warn!(error = %e, "failed to close capture device");
        }
        if let Err(e) = self.display.close() {
            warn!(error = %e, "failed to close display");
        }
        debug!("capture device and display released");
    }
}

impl<C: CaptureDevice, D: DisplaySurface> Drop for LoopContext<C, D> {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct FrameLoop<P: FramePipeline, C: CaptureDevice, D: DisplaySurface> {
    pipeline: P,
    context: LoopContext<C, D>,
    settings: LoopSettings,
    state: LoopState,
    frames_processed: u64,
}

impl<P: FramePipeline, C: CaptureDevice, D: DisplaySurface> FrameLoop<P, C, D> {
    pub fn new(pipeline: P, context: LoopContext<C, D>, settings: LoopSettings) -> Self {
        Self {
            pipeline,
            context,
            settings,
            state: LoopState::Running,
            frames_processed: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn context(&self) -> &LoopContext<C, D> {
        &self.context
    }

    /// Runs one acquire/process/render/poll cycle. Ticking a stopped loop is a no-op.
    pub fn tick(&mut self) -> Result<LoopState> {
        if self.state != LoopState::Running {
            return Ok(self.state);
        }
        match self.step() {
            Ok(LoopState::Running) => Ok(LoopState::Running),
            Ok(LoopState::Stopped(reason)) => {
                self.stop(reason);
                Ok(self.state)
            }
            Err(e) => {
                warn!(error = %e, frame = self.frames_processed, "frame loop failed");
                self.stop(StopReason::Failed);
                Err(e)
            }
        }
    }

    /// Ticks until the loop stops.
    pub fn run(mut self) -> Result<LoopSummary> {
        info!(window = self.pipeline.window_name(), "frame loop started");
        loop {
            if let LoopState::Stopped(reason) = self.tick()? {
                info!(frames = self.frames_processed, ?reason, "frame loop stopped");
                return Ok(LoopSummary {
                    frames_processed: self.frames_processed,
                    reason,
                });
            }
        }
    }

    fn step(&mut self) -> Result<LoopState> {
        let Some(frame) = self.context.capture.read_frame()? else {
            return Ok(LoopState::Stopped(StopReason::EndOfStream));
        };

        let report = self.pipeline.process(&frame)?;
        match &report.detection {
            Detection::Regions(regions) => {
                debug!(frame = self.frames_processed, regions = regions.len(), "regions found");
            }
            Detection::DominantColor { estimate, .. } => {
                debug!(
                    frame = self.frames_processed,
                    centroid = ?estimate.dominant.centroid,
                    members = estimate.dominant.count,
                    fraction = estimate.dominant_fraction(),
                    "dominant color estimated"
                );
            }
        }

        self.context
            .display
            .show(self.pipeline.window_name(), &report.annotated)?;
        self.frames_processed += 1;

        match self.context.display.poll_key(self.settings.poll_timeout)? {
            Some(key) if key & 0xFF == self.settings.exit_key => {
                Ok(LoopState::Stopped(StopReason::ExitRequested))
            }
            _ => Ok(LoopState::Running),
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = LoopState::Stopped(reason);
        self.context.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color::ColorSpace;
    use crate::core_modules::frame::Frame;
    use crate::error::VisionError;
    use crate::pipeline::{Calibration, ThresholdPipeline};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        closes: usize,
        display_closes: usize,
        shown: Vec<(String, Frame)>,
    }

    enum Read {
        Frame(Frame),
        Fail,
    }

    struct ScriptedCapture {
        reads: VecDeque<Read>,
        log: Rc<RefCell<Log>>,
    }

    impl CaptureDevice for ScriptedCapture {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            match self.reads.pop_front() {
                Some(Read::Frame(frame)) => Ok(Some(frame)),
                Some(Read::Fail) => Err(VisionError::capture_msg("device unplugged")),
                None => Ok(None),
            }
        }

        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().closes += 1;
            Ok(())
        }
    }

    struct ScriptedDisplay {
        keys: VecDeque<Option<i32>>,
        log: Rc<RefCell<Log>>,
    }

    impl DisplaySurface for ScriptedDisplay {
        fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
            self.log.borrow_mut().shown.push((window.to_string(), frame.clone()));
            Ok(())
        }

        fn poll_key(&mut self, _timeout: Duration) -> Result<Option<i32>> {
            Ok(self.keys.pop_front().flatten())
        }

        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().display_closes += 1;
            Ok(())
        }
    }

    fn frame() -> Frame {
        let mut frame = Frame::filled(8, 8, [0, 0, 0], ColorSpace::Bgr);
        frame.put_pixel(4, 4, [220, 160, 50]);
        frame
    }

    fn build(
        reads: Vec<Read>,
        keys: Vec<Option<i32>>,
    ) -> (
        FrameLoop<ThresholdPipeline, ScriptedCapture, ScriptedDisplay>,
        Rc<RefCell<Log>>,
    ) {
        let log = Rc::new(RefCell::new(Log::default()));
        let capture = ScriptedCapture {
            reads: reads.into(),
            log: Rc::clone(&log),
        };
        let display = ScriptedDisplay {
            keys: keys.into(),
            log: Rc::clone(&log),
        };
        let calibration = Calibration::default();
        let pipeline =
            ThresholdPipeline::new(calibration.direct_range().unwrap(), calibration.accent);
        let frame_loop = FrameLoop::new(
            pipeline,
            LoopContext::new(capture, display),
            LoopSettings::default(),
        );
        (frame_loop, log)
    }

    #[test]
    fn escape_stops_the_loop_and_releases_the_device() {
        let reads = (0..5).map(|_| Read::Frame(frame())).collect();
        let (frame_loop, log) = build(reads, vec![None, Some(b'q' as i32), Some(27)]);

        let summary = frame_loop.run().unwrap();
        assert_eq!(summary.reason, StopReason::ExitRequested);
        assert_eq!(summary.frames_processed, 3);

        let log = log.borrow();
        assert_eq!(log.closes, 1);
        assert_eq!(log.display_closes, 1);
        assert_eq!(log.shown.len(), 3);
        assert_eq!(log.shown[0].0, "bounded");
        assert_eq!(log.shown[0].1.pixel(4, 4), [0, 0, 255]);
    }

    #[test]
    fn exit_key_is_matched_on_the_low_byte() {
        let (frame_loop, _log) = build(vec![Read::Frame(frame())], vec![Some(0x1000 | 27)]);
        assert_eq!(frame_loop.run().unwrap().reason, StopReason::ExitRequested);
    }

    #[test]
    fn end_of_stream_is_a_clean_stop() {
        let reads = vec![Read::Frame(frame()), Read::Frame(frame())];
        let (mut frame_loop, log) = build(reads, vec![]);

        assert_eq!(frame_loop.tick().unwrap(), LoopState::Running);
        assert_eq!(frame_loop.tick().unwrap(), LoopState::Running);
        assert_eq!(
            frame_loop.tick().unwrap(),
            LoopState::Stopped(StopReason::EndOfStream)
        );
        assert!(frame_loop.context().is_released());
        assert_eq!(frame_loop.frames_processed(), 2);
        // Further ticks do not touch the device again.
        assert_eq!(
            frame_loop.tick().unwrap(),
            LoopState::Stopped(StopReason::EndOfStream)
        );
        drop(frame_loop);
        assert_eq!(log.borrow().closes, 1);
    }

    #[test]
    fn capture_failure_stops_and_reports() {
        let reads = vec![Read::Frame(frame()), Read::Fail, Read::Frame(frame())];
        let (mut frame_loop, log) = build(reads, vec![]);

        assert_eq!(frame_loop.tick().unwrap(), LoopState::Running);
        let err = frame_loop.tick().unwrap_err();
        assert!(err.is_capture_failure());
        assert_eq!(frame_loop.state(), LoopState::Stopped(StopReason::Failed));
        assert_eq!(log.borrow().closes, 1);
        assert_eq!(log.borrow().shown.len(), 1);
    }

    #[test]
    fn pipeline_errors_stop_the_loop_instead_of_skipping() {
        let gray = Frame::filled(4, 4, [10, 10, 10], ColorSpace::Gray);
        let reads = vec![Read::Frame(gray), Read::Frame(frame())];
        let (frame_loop, log) = build(reads, vec![]);

        let err = frame_loop.run().unwrap_err();
        assert!(matches!(err, VisionError::UnsupportedSpace { .. }));
        assert_eq!(log.borrow().closes, 1);
        assert!(log.borrow().shown.is_empty());
    }

    #[test]
    fn dropping_an_unfinished_loop_releases_once() {
        let (mut frame_loop, log) = build(vec![Read::Frame(frame())], vec![]);
        assert_eq!(frame_loop.tick().unwrap(), LoopState::Running);
        drop(frame_loop);
        assert_eq!(log.borrow().closes, 1);
        assert_eq!(log.borrow().display_closes, 1);
    }
}
