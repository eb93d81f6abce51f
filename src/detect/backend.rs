use anyhow::Result;
use std::fmt;

use crate::detect::result::FaceDetection;
use crate::frame::FrameView;

/// Options passed with every pipeline call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectOptions {
    /// Faces below this detector confidence are dropped.
    pub min_score: f32,
    /// At most this many faces are returned, highest confidence first.
    pub max_results: usize,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            min_score: 0.2,
            max_results: 5,
        }
    }
}

impl DetectOptions {
    /// Apply the confidence floor and result cap to a raw pipeline output.
    pub fn apply(&self, mut faces: Vec<FaceDetection>) -> Vec<FaceDetection> {
        faces.retain(|f| f.score >= self.min_score);
        faces.sort_by(|a, b| b.score.total_cmp(&a.score));
        faces.truncate(self.max_results);
        faces
    }
}

/// Perception pipeline boundary.
///
/// A call is the single suspension point of a capture cycle: the loop never has
/// two calls in flight. Implementations must treat the frame view as borrowed
/// for the call only.
pub trait FacePipeline: Send {
    /// Pipeline identifier, used by the registry and in logs.
    fn name(&self) -> &'static str;

    /// Detect faces, landmarks, expressions and demographics in a frame.
    ///
    /// Failures should be reported as `PipelineError` so the loop can tell them
    /// apart from programming errors, but any error halts the cycle.
    fn detect(
        &mut self,
        view: FrameView<'_>,
        options: &DetectOptions,
    ) -> Result<Vec<FaceDetection>>;

    /// Optional warm-up hook, run once before the first cycle.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One inference call failed. Fatal to the cycle, not to the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineError {
    pub pipeline: &'static str,
    pub message: String,
}

impl PipelineError {
    pub fn new(pipeline: &'static str, message: impl Into<String>) -> Self {
        Self {
            pipeline,
            message: message.into(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline {}: {}", self.pipeline, self.message)
    }
}

impl std::error::Error for PipelineError {}
