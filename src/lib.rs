//! Cabin watch.
//!
//! This crate implements the detection/alert control loop for monitoring an
//! enclosed, lockable space (a vehicle cabin) with a camera and a
//! single-class object detector. When the target class is seen, a remote
//! alert is raised at most once per run. On embedded deployments the loop is
//! additionally gated by a physical lock state: an indicator lamp signals
//! "unlocked", and a debounced button press locks the cabin and starts
//! detection.
//!
//! # Module Structure
//!
//! - `frame`: captured frames and pixel-space bounding boxes
//! - `source`: frame sources (image, folder, video file, camera, stub)
//! - `detect`: inference backends, label mapping, confidence filtering
//! - `alert`: one-shot alert dispatcher and its notification policy
//! - `notify`: single-attempt notification channel
//! - `gate`: debounced lock gate over GPIO (embedded deployments)
//! - `metrics`: rolling throughput window
//! - `record`: optional frame capture to disk
//! - `controller`: the synchronous tick loop tying the above together
//!
//! # Execution Model
//!
//! The loop is single-threaded and fully synchronous: frame acquisition,
//! inference, alert evaluation and throughput bookkeeping happen strictly
//! sequentially within one tick. Inference is a blocking call with no
//! timeout; a stalled model stalls the loop. The system is sized for one
//! dedicated camera per process, with a single owner for the camera handle
//! and the GPIO pins. Cancellation is cooperative and observed at tick
//! boundaries.

use std::fmt;

pub mod alert;
pub mod config;
pub mod controller;
pub mod detect;
pub mod frame;
pub mod gate;
pub mod metrics;
pub mod notify;
pub mod record;
pub mod source;

pub use alert::{AlertDispatcher, AlertState, NotificationPolicy};
pub use config::{AlertSettings, GateSettings, WatchConfig};
pub use controller::{DetectionController, NullSink, RenderSink, RunSummary, TickAction};
pub use detect::{Detection, DetectionSet, Detector, InferenceBackend, LabelTable, RawDetection};
pub use frame::{BoundingBox, Frame};
pub use gate::{GpioController, GpioLevel, LockGate, LockState, MemoryGpio};
pub use metrics::RollingFps;
pub use notify::{Notifier, TelegramNotifier};
pub use record::Recorder;
pub use source::{parse_resolution, FrameSource, Resolution, SourceSpec};

// -------------------- Faults --------------------

/// Fatal fault kinds. All of them unwind to the top-level handler, which
/// logs, lets owned resources release, and exits non-zero.
///
/// End-of-stream is not a fault: finite sources signal it by returning
/// `Ok(None)` from `next_frame`. A failed notification attempt is not a
/// fault either; it is handled where it occurs and never escapes the tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Invalid static configuration (missing model file, malformed
    /// resolution string, unknown target label). Raised before the loop
    /// starts.
    Configuration(String),
    /// Camera or video source could not be opened.
    SourceUnavailable(String),
    /// GPIO read/write failure on the embedded variant. There is no
    /// soft-degradation path: the indicator lamp cannot be assumed safe to
    /// ignore.
    Hardware(String),
}

impl Fault {
    pub fn code(&self) -> &'static str {
        match self {
            Fault::Configuration(_) => "CONFIGURATION",
            Fault::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Fault::Hardware(_) => "HARDWARE",
        }
    }

    fn message(&self) -> &str {
        match self {
            Fault::Configuration(msg)
            | Fault::SourceUnavailable(msg)
            | Fault::Hardware(msg) => msg,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_displays_code_and_message() {
        let fault = Fault::Configuration("bad resolution".to_string());
        assert_eq!(fault.to_string(), "CONFIGURATION: bad resolution");
        assert_eq!(fault.code(), "CONFIGURATION");
    }

    #[test]
    fn fault_survives_anyhow_downcast() {
        let err: anyhow::Error = Fault::Hardware("pin 17 unreadable".to_string()).into();
        let fault = err.downcast_ref::<Fault>().expect("fault kind preserved");
        assert_eq!(fault.code(), "HARDWARE");
    }
}
