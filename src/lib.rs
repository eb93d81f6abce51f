//! Scowl Watch
//!
//! Watches a camera feed for faces that hold a chosen expression (by default
//! "angry") for too long and raises an alert.
//!
//! # Architecture
//!
//! Every cycle runs one frame through a fixed chain:
//!
//! 1. **Capture**: a `FrameSource` yields the current frame.
//! 2. **Detect**: one `FacePipeline` call returns face detections with
//!    per-expression scores. This is the only blocking point of a cycle.
//! 3. **Track**: the `EntityTracker` keys each face by position and advances its
//!    alert state machine (Idle → Accumulating → Alerting → Cooled).
//! 4. **Render**: the `OverlayRenderer` clears the surface and draws boxes,
//!    landmarks, labels, the FPS readout and warning labels.
//!
//! Newly alerting faces trigger an `Alarm`, debounced independently of the
//! tracker's per-face cooldown.
//!
//! Frames never leave the cycle that captured them: pixel buffers are private,
//! lent to pipelines through a read-only `FrameView` and zeroized on drop.
//!
//! # Module Structure
//!
//! - `frame`: frame buffers and read-only views
//! - `clock`: millisecond clocks and display pacing
//! - `ingest`: frame sources (synthetic, image directory)
//! - `detect`: detection records, pipelines, pipeline registry
//! - `track`: identity keys and the alert state machine
//! - `alarm`: debounced audio alarm
//! - `render`: canvases and the overlay renderer
//! - `runtime`: the capture loop and its pause/resume control
//! - `config`: daemon configuration

pub mod alarm;
pub mod clock;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod render;
pub mod runtime;
pub mod track;

pub use alarm::{Alarm, AlarmToken, AudioSink, SilentSink, TerminalBell, DEFAULT_ALARM_CLIP_MS};
pub use clock::{Clock, FramePacer, ManualClock, Millis, MonotonicClock};
pub use config::WatchConfig;
pub use detect::{
    BoxRect, DetectOptions, ExpressionScores, FaceDetection, FacePipeline, MalformedDetection,
    PipelineError, PipelineRegistry, Point, ScriptedPipeline, StubPipeline,
};
pub use frame::{Frame, FrameView};
pub use ingest::{AcquisitionError, CameraSource, FrameSource, SourceConfig, SyntheticSource};
pub use render::{Canvas, Color, DisplayList, OverlayRenderer, OverlayStyle};
pub use runtime::{CaptureLoop, ControlEvent, CycleOutcome, LoopState, LoopStats};
pub use track::{
    AlertEvent, AlertPolicy, AlertState, EntityPhase, EntityTracker, IdentityKey,
    IdentityResolver, RenderableEntity,
};
