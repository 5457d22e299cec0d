//! One-shot alert dispatch.
//!
//! The dispatcher is a two-state machine: it starts Idle and moves to Sent
//! at most once per run, on the first qualifying detection set (or at the
//! end of the run, under that policy). Sent is terminal; there is no way
//! back. A failed delivery still counts as the one attempt: retrying on a
//! transient transport error would turn a single-shot alarm into a
//! repeating one.

use std::str::FromStr;

use crate::detect::DetectionSet;
use crate::notify::Notifier;
use crate::Fault;

/// Alert lifecycle. Monotonic: Idle transitions to Sent exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Sent,
}

/// When the target label triggers the notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotificationPolicy {
    /// Notify on the first frame whose detections contain the target.
    #[default]
    FirstOccurrence,
    /// Accumulate sightings across the whole run and notify once at the
    /// end if the target was ever seen.
    EndOfRun,
}

impl FromStr for NotificationPolicy {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "first_occurrence" => Ok(NotificationPolicy::FirstOccurrence),
            "end_of_run" => Ok(NotificationPolicy::EndOfRun),
            other => Err(Fault::Configuration(format!(
                "unknown notification policy '{}': expected first_occurrence or end_of_run",
                other
            ))
            .into()),
        }
    }
}

/// Decides, from offered detection sets, whether and when to fire the one
/// notification this run is allowed.
pub struct AlertDispatcher {
    state: AlertState,
    policy: NotificationPolicy,
    target_label: String,
    message: String,
    notifier: Box<dyn Notifier>,
    target_seen: bool,
}

impl AlertDispatcher {
    pub fn new(
        policy: NotificationPolicy,
        target_label: &str,
        message: &str,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            state: AlertState::Idle,
            policy,
            target_label: target_label.to_string(),
            message: message.to_string(),
            notifier,
            target_seen: false,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn policy(&self) -> NotificationPolicy {
        self.policy
    }

    /// Offer one frame's detections. Once Sent, every further set is
    /// ignored.
    pub fn offer(&mut self, detections: &DetectionSet) {
        if self.state == AlertState::Sent {
            return;
        }
        if !detections.iter().any(|d| d.label == self.target_label) {
            return;
        }
        match self.policy {
            NotificationPolicy::FirstOccurrence => self.dispatch(),
            NotificationPolicy::EndOfRun => self.target_seen = true,
        }
    }

    /// End-of-run evaluation. Under the end-of-run policy this is where the
    /// single attempt happens; under first-occurrence it is a no-op.
    pub fn finish(&mut self) {
        if self.policy == NotificationPolicy::EndOfRun
            && self.target_seen
            && self.state == AlertState::Idle
        {
            self.dispatch();
        }
    }

    fn dispatch(&mut self) {
        match self.notifier.send(&self.message) {
            Ok(()) => log::info!("alert delivered: {}", self.message),
            // The attempt is still recorded; the loop carries on.
            Err(e) => log::warn!("alert delivery failed: {}", e),
        }
        self.state = AlertState::Sent;
    }
}
