//! The detection loop.
//!
//! One tick: pull a frame (or terminate on end of stream), run the
//! detector, offer the result to the alert dispatcher, record the frame
//! when capture is enabled, update the throughput window, then hand the
//! frame to the render sink. The sink's returned action (quit, snapshot)
//! is the only feedback path from the display surface into the loop.
//!
//! The controller exclusively owns the frame source and, when configured,
//! the lock gate's GPIO handles. Both are released on every termination
//! path: end of stream, user quit and fatal errors all unwind through the
//! same drop points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::alert::{AlertDispatcher, AlertState};
use crate::detect::{DetectionSet, Detector};
use crate::frame::Frame;
use crate::gate::LockGate;
use crate::metrics::RollingFps;
use crate::record::Recorder;
use crate::source::FrameSource;

const HEALTH_LOG_EVERY_TICKS: u64 = 100;

/// Per-tick feedback from the render surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    Continue,
    /// Write the current frame to disk as a PNG.
    Snapshot,
    /// Stop the loop after this tick.
    Quit,
}

/// Consumer of processed frames. Rendering itself is out of scope; the
/// crate ships a headless implementation and real displays plug in here.
pub trait RenderSink {
    fn present(&mut self, frame: &Frame, detections: &DetectionSet, fps: f64)
        -> Result<TickAction>;
}

/// Headless sink: discards frames and never requests anything.
pub struct NullSink;

impl RenderSink for NullSink {
    fn present(
        &mut self,
        _frame: &Frame,
        _detections: &DetectionSet,
        _fps: f64,
    ) -> Result<TickAction> {
        Ok(TickAction::Continue)
    }
}

/// How a run ended, plus its bookkeeping totals.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub average_fps: f64,
    pub alert_state: AlertState,
}

pub struct DetectionController {
    source: FrameSource,
    detector: Detector,
    dispatcher: AlertDispatcher,
    gate: Option<LockGate>,
    recorder: Option<Recorder>,
    sink: Box<dyn RenderSink>,
    fps: RollingFps,
    min_confidence: f32,
    quit: Arc<AtomicBool>,
    ticks: u64,
}

impl DetectionController {
    pub fn new(
        source: FrameSource,
        detector: Detector,
        dispatcher: AlertDispatcher,
        min_confidence: f32,
    ) -> Self {
        Self {
            source,
            detector,
            dispatcher,
            gate: None,
            recorder: None,
            sink: Box::new(NullSink),
            fps: RollingFps::new(),
            min_confidence,
            quit: Arc::new(AtomicBool::new(false)),
            ticks: 0,
        }
    }

    pub fn with_gate(mut self, gate: LockGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn RenderSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share the cooperative quit flag. Setting it stops the loop at the
    /// next tick boundary, never mid-tick.
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    pub fn alert_state(&self) -> AlertState {
        self.dispatcher.state()
    }

    /// Run until the source exhausts, the user quits or a fatal error
    /// unwinds. The gate, when present, blocks everything else first.
    pub fn run(&mut self) -> Result<RunSummary> {
        if let Some(gate) = self.gate.as_mut() {
            gate.engage()?;
            while !gate.poll_locked()? {
                if self.quit.load(Ordering::Relaxed) {
                    log::info!("quit requested while waiting for the lock");
                    return Ok(self.finish());
                }
                std::thread::sleep(gate.poll_interval());
            }
        }

        loop {
            if self.quit.load(Ordering::Relaxed) {
                log::info!("quit requested");
                break;
            }

            let tick_start = Instant::now();
            let Some(frame) = self.source.next_frame()? else {
                log::info!("source exhausted after {} frames", self.ticks);
                break;
            };

            let detections = self.detector.detect(&frame, self.min_confidence)?;
            self.dispatcher.offer(&detections);

            if let Some(recorder) = self.recorder.as_mut() {
                recorder.write(&frame)?;
            }

            self.fps.record(tick_start.elapsed().as_secs_f64());
            self.ticks += 1;

            if self.ticks % HEALTH_LOG_EVERY_TICKS == 0 {
                log::debug!(
                    "{} frames processed, {:.2} fps",
                    self.ticks,
                    self.fps.average()
                );
            }

            match self.sink.present(&frame, &detections, self.fps.average())? {
                TickAction::Continue => {}
                TickAction::Snapshot => self.snapshot(&frame)?,
                TickAction::Quit => {
                    log::info!("quit requested by render surface");
                    break;
                }
            }
        }

        Ok(self.finish())
    }

    fn finish(&mut self) -> RunSummary {
        self.dispatcher.finish();
        let summary = RunSummary {
            frames_processed: self.ticks,
            average_fps: self.fps.average(),
            alert_state: self.dispatcher.state(),
        };
        log::info!(
            "run finished: {} frames, {:.2} avg fps, alert {:?}",
            summary.frames_processed,
            summary.average_fps,
            summary.alert_state
        );
        summary
    }

    fn snapshot(&self, frame: &Frame) -> Result<()> {
        let path = format!("snapshot_{:06}.png", frame.index);
        frame
            .pixels
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("cannot write {}", path))?;
        log::info!("snapshot written to {}", path);
        Ok(())
    }
}
