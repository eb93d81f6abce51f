//! Capture → detect → track → render loop.
//!
//! The loop is single threaded. Each cycle captures one frame, makes exactly one
//! pipeline call (the only point where the loop waits on external work), feeds
//! the detections to the tracker and redraws the surface. Control input arrives
//! as `ControlEvent`s on a channel and is applied between cycles, so a pause
//! requested while the pipeline is busy takes effect after that cycle has been
//! rendered.
//!
//! ```text
//!   Stopped --start--> Running --pause--> Paused --resume--> Running
//!                         |                                    ^
//!                         +--pipeline error--> Halted --resume-+
//! ```
//!
//! A failed cycle is never retried automatically.

use anyhow::{bail, Result};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crate::alarm::Alarm;
use crate::clock::{Clock, FramePacer, MonotonicClock};
use crate::detect::{DetectOptions, FacePipeline};
use crate::ingest::FrameSource;
use crate::render::{Canvas, OverlayRenderer};
use crate::track::EntityTracker;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Not started, failed to start, or shut down.
    Stopped,
    Running,
    /// Paused by the user.
    Paused,
    /// Stopped scheduling after a failed cycle. Resumable.
    Halted,
}

/// User input delivered to a running loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Click/tap on the surface: pause when running, resume otherwise.
    Toggle,
    Pause,
    Resume,
    Shutdown,
}

/// Result of one cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Frame processed and the overlay redrawn.
    Rendered {
        entities: usize,
        alerting: usize,
        fps: Option<f32>,
    },
    /// The cycle failed and the loop is now halted.
    Halted { error: String },
    /// The loop was not running; nothing happened.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopStats {
    pub cycles_rendered: u64,
    pub cycles_failed: u64,
    pub alerts_fired: u64,
    pub pauses: u64,
    pub resumes: u64,
    pub last_fps: Option<f32>,
}

/// Frames per second implied by one pipeline call, `None` when too fast to measure.
pub fn fps_from_latency(latency: Duration) -> Option<f32> {
    let ms = latency.as_secs_f64() * 1000.0;
    if ms > 0.0 {
        Some((1000.0 / ms) as f32)
    } else {
        None
    }
}

/// Restartable loop bound to a frame source `S` and a render surface `K`.
pub struct CaptureLoop<S: FrameSource, K: Canvas> {
    pipeline: Box<dyn FacePipeline>,
    options: DetectOptions,
    tracker: EntityTracker,
    renderer: OverlayRenderer,
    alarm: Alarm,
    clock: Box<dyn Clock>,
    pacer: FramePacer,
    state: LoopState,
    source: Option<S>,
    surface: Option<K>,
    stats: LoopStats,
}

impl<S: FrameSource, K: Canvas> CaptureLoop<S, K> {
    pub fn new(
        pipeline: Box<dyn FacePipeline>,
        tracker: EntityTracker,
        renderer: OverlayRenderer,
        alarm: Alarm,
    ) -> Self {
        Self {
            pipeline,
            options: DetectOptions::default(),
            tracker,
            renderer,
            alarm,
            clock: Box::new(MonotonicClock::new()),
            pacer: FramePacer::immediate(),
            state: LoopState::Stopped,
            source: None,
            surface: None,
            stats: LoopStats::default(),
        }
    }

    pub fn with_options(mut self, options: DetectOptions) -> Self {
        self.options = options;
        self
    }

    /// Time source for tracker and alarm timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_pacer(mut self, pacer: FramePacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    /// The surface keeps showing the last rendered overlay while paused or halted.
    pub fn surface(&self) -> Option<&K> {
        self.surface.as_ref()
    }

    /// Open `source` and begin scheduling cycles onto `surface`.
    ///
    /// On an acquisition failure the loop stays `Stopped` and the error is
    /// returned to the caller.
    pub fn start(&mut self, mut source: S, surface: K) -> Result<()> {
        if self.state != LoopState::Stopped {
            bail!("capture loop already started ({:?})", self.state);
        }
        if let Err(e) = source.open() {
            log::error!("failed to start capture: {:#}", e);
            return Err(e);
        }
        if let Err(e) = self.pipeline.warm_up() {
            log::warn!("pipeline {} warm-up failed: {:#}", self.pipeline.name(), e);
        }
        log::info!(
            "capture started: source={} pipeline={}",
            source.stats().url,
            self.pipeline.name()
        );
        self.source = Some(source);
        self.surface = Some(surface);
        self.pacer.reset();
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run one cycle if the loop is running.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.state != LoopState::Running {
            return CycleOutcome::Skipped;
        }
        let (Some(source), Some(surface)) = (self.source.as_mut(), self.surface.as_mut()) else {
            self.state = LoopState::Stopped;
            return CycleOutcome::Skipped;
        };

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("capture error: {:#}", e);
                return self.halt(format!("{:#}", e));
            }
        };

        let started = Instant::now();
        let detections = match self.pipeline.detect(frame.view(), &self.options) {
            Ok(detections) => detections,
            Err(e) => {
                log::error!("detect error: {:#}", e);
                return self.halt(format!("{:#}", e));
            }
        };
        let latency = started.elapsed();

        let now = self.clock.now_ms();
        let alarm = &mut self.alarm;
        let stats = &mut self.stats;
        let entities = self.tracker.update(detections, now, |event| {
            log::warn!(
                "alert: entity={} score={:.2} until={}",
                event.key,
                event.score,
                event.persist_until
            );
            stats.alerts_fired += 1;
            alarm.trigger(event.at);
        });

        let fps = fps_from_latency(latency);
        if let Err(e) = self.renderer.draw(surface, frame.view(), &entities, fps) {
            log::error!("render error: {:#}", e);
            return self.halt(format!("{:#}", e));
        }
        log::debug!(
            "cycle frame={} faces={} latency={:?}",
            frame.seq,
            entities.len(),
            latency
        );

        self.stats.cycles_rendered += 1;
        self.stats.last_fps = fps;
        CycleOutcome::Rendered {
            entities: entities.len(),
            alerting: entities.iter().filter(|e| e.is_alerting).count(),
            fps,
        }
    }

    fn halt(&mut self, error: String) -> CycleOutcome {
        self.stats.cycles_failed += 1;
        self.state = LoopState::Halted;
        log::info!("capture halted; resume to retry");
        CycleOutcome::Halted { error }
    }

    /// Stop scheduling and freeze the source. No-op unless running.
    pub fn pause(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
        self.state = LoopState::Paused;
        self.stats.pauses += 1;
        log::info!("capture paused");
    }

    /// Restart playback and scheduling from a fresh cycle.
    ///
    /// Valid from `Paused` and `Halted`; a no-op while running.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            LoopState::Running => return Ok(()),
            LoopState::Stopped => bail!("capture loop is not started"),
            LoopState::Paused | LoopState::Halted => {}
        }
        if let Some(source) = self.source.as_mut() {
            source.play()?;
        }
        self.pacer.reset();
        self.state = LoopState::Running;
        self.stats.resumes += 1;
        log::info!("capture resumed");
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<()> {
        match self.state {
            LoopState::Running => {
                self.pause();
                Ok(())
            }
            _ => self.resume(),
        }
    }

    /// Stop scheduling for good. The last overlay stays on the surface.
    pub fn shutdown(&mut self) {
        if self.state != LoopState::Stopped {
            log::info!("capture stopped");
        }
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
        self.state = LoopState::Stopped;
    }

    /// Apply one control event. Returns false once the loop should exit.
    pub fn handle(&mut self, event: ControlEvent) -> bool {
        let result = match event {
            ControlEvent::Toggle => self.toggle(),
            ControlEvent::Pause => {
                self.pause();
                Ok(())
            }
            ControlEvent::Resume => self.resume(),
            ControlEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        };
        if let Err(e) = result {
            log::error!("failed to apply {:?}: {:#}", event, e);
        }
        true
    }

    /// Drive the loop until `Shutdown` arrives.
    ///
    /// Pending events are applied before each cycle. While paused or halted the
    /// loop blocks on `control`. Returns when a `Shutdown` is received, or when
    /// every sender is gone and the loop is not running.
    pub fn run(&mut self, control: &Receiver<ControlEvent>) -> Result<()> {
        if self.state == LoopState::Stopped {
            bail!("capture loop is not started");
        }
        let mut last_health_log = Instant::now();
        let mut senders_gone = false;

        loop {
            while !senders_gone {
                match control.try_recv() {
                    Ok(event) => {
                        if !self.handle(event) {
                            return Ok(());
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => senders_gone = true,
                }
            }

            if self.state == LoopState::Running {
                self.pacer.wait_next_paint();
                self.run_cycle();
            } else if senders_gone {
                return Ok(());
            } else {
                match control.recv() {
                    Ok(event) => {
                        if !self.handle(event) {
                            return Ok(());
                        }
                    }
                    Err(_) => senders_gone = true,
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                self.log_health();
                last_health_log = Instant::now();
            }
        }
    }

    fn log_health(&self) {
        let frames = self
            .source
            .as_ref()
            .map(|s| s.stats().frames_captured)
            .unwrap_or(0);
        let fps = self
            .stats
            .last_fps
            .map(|fps| format!("{:.1}", fps))
            .unwrap_or_else(|| "-".to_string());
        log::info!(
            "health state={:?} frames={} rendered={} failed={} fps={} tracked={} alarms={}",
            self.state,
            frames,
            self.stats.cycles_rendered,
            self.stats.cycles_failed,
            fps,
            self.tracker.len(),
            self.alarm.plays()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubPipeline;
    use crate::ingest::{SourceConfig, SyntheticSource};
    use crate::render::DisplayList;
    use crate::track::AlertPolicy;

    fn capture_loop() -> CaptureLoop<SyntheticSource, DisplayList> {
        CaptureLoop::new(
            Box::new(StubPipeline::new()),
            EntityTracker::new(AlertPolicy::default()),
            OverlayRenderer::default(),
            Alarm::default(),
        )
    }

    fn source(url: &str) -> SyntheticSource {
        SyntheticSource::new(SourceConfig {
            url: url.to_string(),
            width: 32,
            height: 24,
        })
    }

    #[test]
    fn fps_is_inverse_latency() {
        assert_eq!(fps_from_latency(Duration::from_millis(50)), Some(20.0));
        assert_eq!(fps_from_latency(Duration::ZERO), None);
    }

    #[test]
    fn cycles_skip_until_started() {
        let mut lp = capture_loop();
        assert_eq!(lp.run_cycle(), CycleOutcome::Skipped);
        assert!(lp.resume().is_err());
    }

    #[test]
    fn toggle_alternates_pause_and_resume() {
        let mut lp = capture_loop();
        lp.start(source("stub://toggle"), DisplayList::new()).unwrap();
        assert!(matches!(lp.run_cycle(), CycleOutcome::Rendered { .. }));

        lp.toggle().unwrap();
        assert_eq!(lp.state(), LoopState::Paused);
        assert!(lp.source().unwrap().is_paused());
        assert_eq!(lp.run_cycle(), CycleOutcome::Skipped);

        lp.toggle().unwrap();
        assert_eq!(lp.state(), LoopState::Running);
        assert!(!lp.source().unwrap().is_paused());
        assert_eq!(lp.stats().pauses, 1);
        assert_eq!(lp.stats().resumes, 1);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut lp = capture_loop();
        lp.start(source("stub://a"), DisplayList::new()).unwrap();
        assert!(lp.start(source("stub://b"), DisplayList::new()).is_err());
        assert_eq!(lp.source().unwrap().stats().url, "stub://a");
    }

    #[test]
    fn run_exits_on_shutdown_event() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut lp = capture_loop();
        lp.start(source("stub://run"), DisplayList::new()).unwrap();
        tx.send(ControlEvent::Shutdown).unwrap();
        lp.run(&rx).unwrap();
        assert_eq!(lp.state(), LoopState::Stopped);
        assert_eq!(lp.stats().cycles_rendered, 0);
    }
}
