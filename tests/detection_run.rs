//! End-to-end runs over synthetic frames with a scripted backend.

use std::cell::RefCell;
use std::rc::Rc;

use cabinwatch::detect::backends::ScriptedBackend;
use cabinwatch::{
    AlertDispatcher, AlertState, DetectionController, DetectionSet, Detector, Frame, FrameSource,
    GateSettings, GpioLevel, LabelTable, LockGate, MemoryGpio, NotificationPolicy, Notifier,
    RawDetection, RenderSink, SourceSpec, TickAction,
};

struct RecordingNotifier {
    sent: Rc<RefCell<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &str) -> anyhow::Result<()> {
        self.sent.borrow_mut().push(message.to_string());
        Ok(())
    }
}

/// Sink that records, per tick, how many detections the frame carried and
/// which action to return.
struct CountingSink {
    counts: Rc<RefCell<Vec<usize>>>,
    quit_after: Option<u64>,
}

impl RenderSink for CountingSink {
    fn present(
        &mut self,
        frame: &Frame,
        detections: &DetectionSet,
        _fps: f64,
    ) -> anyhow::Result<TickAction> {
        self.counts.borrow_mut().push(detections.len());
        match self.quit_after {
            Some(limit) if frame.index >= limit => Ok(TickAction::Quit),
            _ => Ok(TickAction::Continue),
        }
    }
}

fn kid(confidence: f32) -> RawDetection {
    RawDetection {
        class_id: 0,
        confidence,
        xmin: 10.0,
        ymin: 10.0,
        xmax: 120.0,
        ymax: 200.0,
    }
}

fn stub_source(frames: u64) -> FrameSource {
    let spec = SourceSpec::parse(&format!("stub://cabin?frames={}", frames)).expect("stub spec");
    FrameSource::open(&spec, None).expect("open stub source")
}

fn dispatcher_with_probe(
    policy: NotificationPolicy,
) -> (Rc<RefCell<Vec<String>>>, AlertDispatcher) {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let dispatcher = AlertDispatcher::new(
        policy,
        "Kid",
        "ALERT: A kid was detected inside the locked car!",
        Box::new(RecordingNotifier {
            sent: Rc::clone(&sent),
        }),
    );
    (sent, dispatcher)
}

#[test]
fn three_frame_run_alerts_exactly_once_at_the_first_sighting() {
    // Frame 1: nothing. Frame 2: one Kid at 0.9. Frame 3: the same again.
    let backend = ScriptedBackend::new(vec![vec![], vec![kid(0.9)], vec![kid(0.9)]]);
    let detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, dispatcher) = dispatcher_with_probe(NotificationPolicy::FirstOccurrence);

    let counts = Rc::new(RefCell::new(Vec::new()));
    let mut controller =
        DetectionController::new(stub_source(3), detector, dispatcher, 0.5).with_sink(Box::new(
            CountingSink {
                counts: Rc::clone(&counts),
                quit_after: None,
            },
        ));

    let summary = controller.run().expect("run");

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.alert_state, AlertState::Sent);
    assert_eq!(*counts.borrow(), vec![0, 1, 1]);
    let sent = sent.borrow();
    assert_eq!(sent.len(), 1, "exactly one notification attempt");
    assert!(sent[0].contains("kid"));
}

#[test]
fn dispatcher_state_sequence_over_the_three_frame_run() {
    // The same scenario, driven frame by frame so each state is observable:
    // Idle before, Idle after the empty frame, Sent from frame 2 on.
    let backend = ScriptedBackend::new(vec![vec![], vec![kid(0.9)], vec![kid(0.9)]]);
    let mut detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, mut dispatcher) = dispatcher_with_probe(NotificationPolicy::FirstOccurrence);
    let mut source = stub_source(3);

    let mut states = vec![dispatcher.state()];
    while let Some(frame) = source.next_frame().expect("frame") {
        let detections = detector.detect(&frame, 0.5).expect("detect");
        dispatcher.offer(&detections);
        states.push(dispatcher.state());
        if frame.index == 2 {
            assert_eq!(sent.borrow().len(), 1, "attempt is timed at frame 2");
        }
    }

    assert_eq!(
        states,
        vec![
            AlertState::Idle,
            AlertState::Idle,
            AlertState::Sent,
            AlertState::Sent
        ]
    );
    assert_eq!(sent.borrow().len(), 1);
}

#[test]
fn high_threshold_excludes_low_confidence_detections_everywhere() {
    // Confidence 0.4 against a 0.9 threshold: every set is empty and no
    // alert fires regardless of label.
    let backend = ScriptedBackend::new(vec![vec![kid(0.4)], vec![kid(0.4)], vec![kid(0.4)]]);
    let detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, dispatcher) = dispatcher_with_probe(NotificationPolicy::FirstOccurrence);

    let counts = Rc::new(RefCell::new(Vec::new()));
    let mut controller =
        DetectionController::new(stub_source(3), detector, dispatcher, 0.9).with_sink(Box::new(
            CountingSink {
                counts: Rc::clone(&counts),
                quit_after: None,
            },
        ));

    let summary = controller.run().expect("run");

    assert_eq!(summary.alert_state, AlertState::Idle);
    assert_eq!(*counts.borrow(), vec![0, 0, 0]);
    assert!(sent.borrow().is_empty());
}

#[test]
fn end_of_run_policy_alerts_once_when_the_run_finishes() {
    // Sighting in the middle of the run, gone by the end: the end-of-run
    // evaluation still fires because sightings accumulate across frames.
    let backend = ScriptedBackend::new(vec![vec![], vec![kid(0.9)], vec![]]);
    let detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, dispatcher) = dispatcher_with_probe(NotificationPolicy::EndOfRun);

    let mut controller = DetectionController::new(stub_source(3), detector, dispatcher, 0.5);
    let summary = controller.run().expect("run");

    assert_eq!(summary.alert_state, AlertState::Sent);
    assert_eq!(sent.borrow().len(), 1);
}

#[test]
fn render_sink_quit_stops_the_loop_early() {
    let backend = ScriptedBackend::new(vec![]);
    let detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, dispatcher) = dispatcher_with_probe(NotificationPolicy::FirstOccurrence);

    let counts = Rc::new(RefCell::new(Vec::new()));
    let mut controller =
        DetectionController::new(stub_source(10), detector, dispatcher, 0.5).with_sink(Box::new(
            CountingSink {
                counts: Rc::clone(&counts),
                quit_after: Some(2),
            },
        ));

    let summary = controller.run().expect("run");

    assert_eq!(summary.frames_processed, 2);
    assert_eq!(summary.alert_state, AlertState::Idle);
    assert!(sent.borrow().is_empty());
}

#[test]
fn gated_run_latches_the_lock_before_processing_frames() {
    let backend = ScriptedBackend::new(vec![vec![kid(0.9)]]);
    let detector = Detector::new(Box::new(backend), LabelTable::single("Kid"));
    let (sent, dispatcher) = dispatcher_with_probe(NotificationPolicy::FirstOccurrence);

    // Button idle for two polls, then pressed and held.
    let gpio = MemoryGpio::with_input_script(6, vec![GpioLevel::High, GpioLevel::High]);
    let probe = gpio.probe();
    let settings = GateSettings {
        enabled: true,
        lamp_pin: 5,
        button_pin: 6,
        button_active_low: true,
        poll_ms: 1,
        debounce_ms: 0,
    };
    let gate = LockGate::new(Box::new(gpio), &settings);

    let mut controller = DetectionController::new(stub_source(1), detector, dispatcher, 0.5)
        .with_gate(gate);
    let summary = controller.run().expect("run");

    // The lamp went on while unlocked and off once locked, and the frame
    // was processed only after the latch.
    assert_eq!(probe.output_level(5), Some(GpioLevel::Low));
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.alert_state, AlertState::Sent);
    assert_eq!(sent.borrow().len(), 1);
}
