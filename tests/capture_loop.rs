use std::sync::mpsc::{self, Sender};

use anyhow::Result;

use scowl_watch::detect::backends::ScriptStep;
use scowl_watch::{
    AcquisitionError, Alarm, AlertPolicy, BoxRect, CaptureLoop, ControlEvent, CycleOutcome,
    DetectOptions, DisplayList, EntityTracker, FaceDetection, FacePipeline, FrameSource,
    FrameView, LoopState, ManualClock, OverlayRenderer, Point, ScriptedPipeline, SourceConfig,
    SyntheticSource,
};

fn face(x: f32, y: f32, angry: f32) -> FaceDetection {
    FaceDetection {
        bbox: Some(BoxRect::new(x, y, 100.0, 100.0)),
        score: 0.9,
        landmarks: vec![Point(x + 20.0, y + 40.0)],
        expressions: [("neutral", 1.0 - angry), ("angry", angry)]
            .into_iter()
            .collect(),
        gender: "male".to_string(),
        gender_probability: None,
        age: None,
    }
}

fn ok(faces: Vec<FaceDetection>) -> ScriptStep {
    ScriptStep {
        faces,
        ..ScriptStep::default()
    }
}

fn fail(message: &str) -> ScriptStep {
    ScriptStep {
        error: Some(message.to_string()),
        ..ScriptStep::default()
    }
}

fn source(url: &str) -> SyntheticSource {
    SyntheticSource::new(SourceConfig {
        url: url.to_string(),
        width: 64,
        height: 48,
    })
}

fn capture_loop(
    pipeline: impl FacePipeline + 'static,
) -> CaptureLoop<SyntheticSource, DisplayList> {
    CaptureLoop::new(
        Box::new(pipeline),
        EntityTracker::new(AlertPolicy::default()),
        OverlayRenderer::default(),
        Alarm::default(),
    )
}

#[test]
fn acquisition_failure_leaves_loop_stopped() {
    let mut lp = capture_loop(ScriptedPipeline::new(vec![]));

    let err = lp
        .start(source("stub://denied"), DisplayList::new())
        .unwrap_err();
    let acquisition = err.downcast_ref::<AcquisitionError>().unwrap();
    assert_eq!(acquisition.reason, "permission denied");

    assert_eq!(lp.state(), LoopState::Stopped);
    assert!(lp.surface().is_none());
    assert_eq!(lp.run_cycle(), CycleOutcome::Skipped);

    // A later start with a working source succeeds.
    lp.start(source("stub://front"), DisplayList::new()).unwrap();
    assert_eq!(lp.state(), LoopState::Running);
}

#[test]
fn pipeline_failure_halts_until_resumed() {
    let script = vec![
        ok(vec![face(100.0, 100.0, 0.6)]),
        fail("backend lost"),
        ok(vec![face(100.0, 100.0, 0.6)]),
    ];
    let mut lp = capture_loop(ScriptedPipeline::new(script));
    lp.start(source("stub://front"), DisplayList::new()).unwrap();

    assert!(matches!(
        lp.run_cycle(),
        CycleOutcome::Rendered { entities: 1, .. }
    ));

    match lp.run_cycle() {
        CycleOutcome::Halted { error } => assert!(error.contains("backend lost"), "{}", error),
        other => panic!("expected halt, got {:?}", other),
    }
    assert_eq!(lp.state(), LoopState::Halted);
    assert_eq!(lp.run_cycle(), CycleOutcome::Skipped);

    // The last good overlay stays on the surface.
    let surface = lp.surface().unwrap();
    assert_eq!(surface.presented(), 1);
    assert!(surface.texts().contains(&"expression: 60% angry"));

    lp.resume().unwrap();
    assert!(matches!(
        lp.run_cycle(),
        CycleOutcome::Rendered { entities: 1, .. }
    ));
    assert_eq!(lp.stats().cycles_failed, 1);
    assert_eq!(lp.stats().cycles_rendered, 2);
}

#[test]
fn run_stops_rescheduling_after_failure() {
    let script = vec![ok(vec![]), ok(vec![]), fail("model crashed"), ok(vec![])];
    let mut lp = capture_loop(ScriptedPipeline::new(script));
    lp.start(source("stub://front"), DisplayList::new()).unwrap();

    let (tx, rx) = mpsc::channel();
    drop(tx);
    lp.run(&rx).unwrap();

    assert_eq!(lp.state(), LoopState::Halted);
    assert_eq!(lp.stats().cycles_rendered, 2);
    assert_eq!(lp.stats().cycles_failed, 1);
}

#[test]
fn pause_resume_cycles_repeatedly() {
    let mut lp = capture_loop(
        ScriptedPipeline::new(vec![ok(vec![face(100.0, 100.0, 0.2)])]).looping(true),
    );
    lp.start(source("stub://front"), DisplayList::new()).unwrap();

    for round in 1..=25u64 {
        assert!(matches!(lp.run_cycle(), CycleOutcome::Rendered { .. }));
        lp.pause();
        assert_eq!(lp.state(), LoopState::Paused);
        assert!(lp.source().unwrap().is_paused());

        assert_eq!(lp.run_cycle(), CycleOutcome::Skipped);
        let surface = lp.surface().unwrap();
        assert_eq!(surface.presented(), round);
        assert!(surface.rects().len() == 1);

        lp.pause();
        lp.resume().unwrap();
        lp.resume().unwrap();
    }
    assert_eq!(lp.stats().pauses, 25);
    assert_eq!(lp.stats().resumes, 25);
}

#[test]
fn toggle_events_drive_the_loop() {
    let mut lp = capture_loop(ScriptedPipeline::new(vec![ok(vec![])]).looping(true));
    lp.start(source("stub://front"), DisplayList::new()).unwrap();

    let (tx, rx) = mpsc::channel();
    tx.send(ControlEvent::Toggle).unwrap();
    tx.send(ControlEvent::Toggle).unwrap();
    tx.send(ControlEvent::Pause).unwrap();
    drop(tx);
    lp.run(&rx).unwrap();

    assert_eq!(lp.state(), LoopState::Paused);
    assert_eq!(lp.stats().pauses, 2);
    assert_eq!(lp.stats().resumes, 1);
    assert_eq!(lp.stats().cycles_rendered, 0);
}

/// Requests a pause from inside its first call, as a click during inference would.
struct PausingPipeline {
    control: Option<Sender<ControlEvent>>,
}

impl FacePipeline for PausingPipeline {
    fn name(&self) -> &'static str {
        "pausing"
    }

    fn detect(
        &mut self,
        _view: FrameView<'_>,
        options: &DetectOptions,
    ) -> Result<Vec<FaceDetection>> {
        if let Some(control) = self.control.take() {
            control.send(ControlEvent::Pause)?;
        }
        Ok(options.apply(vec![face(200.0, 120.0, 0.9)]))
    }
}

#[test]
fn pause_during_pipeline_call_renders_that_result_once() {
    let (tx, rx) = mpsc::channel();
    let mut lp = capture_loop(PausingPipeline {
        control: Some(tx.clone()),
    });
    lp.start(source("stub://front"), DisplayList::new()).unwrap();
    drop(tx);

    lp.run(&rx).unwrap();

    assert_eq!(lp.state(), LoopState::Paused);
    assert_eq!(lp.stats().cycles_rendered, 1);
    assert_eq!(lp.surface().unwrap().presented(), 1);
    assert_eq!(lp.tracker().len(), 1);
}

#[test]
fn simultaneous_alerts_sound_the_alarm_once() {
    let two_faces = || ok(vec![face(100.0, 100.0, 0.8), face(400.0, 100.0, 0.8)]);
    let script = (0..6).map(|_| two_faces()).collect();
    let clock = ManualClock::new(0);
    let mut lp = capture_loop(ScriptedPipeline::new(script)).with_clock(clock.clone());
    lp.start(source("stub://front"), DisplayList::new()).unwrap();

    for t in [0, 1000, 2000, 3000] {
        clock.set(t);
        assert!(matches!(
            lp.run_cycle(),
            CycleOutcome::Rendered { alerting: 0, .. }
        ));
    }

    clock.set(3100);
    assert!(matches!(
        lp.run_cycle(),
        CycleOutcome::Rendered {
            entities: 2,
            alerting: 2,
            ..
        }
    ));
    assert_eq!(lp.stats().alerts_fired, 2);
    assert_eq!(lp.alarm().plays(), 1);
    assert!(lp.alarm().is_playing(3100));

    let texts = lp.surface().unwrap().texts();
    assert_eq!(texts.iter().filter(|t| **t == "⚠ Angry > 3s").count(), 2);

    clock.set(3200);
    lp.run_cycle();
    assert_eq!(lp.alarm().plays(), 1);
}
