//! Scripted pipeline: replays recorded detections.
//!
//! A script is JSON Lines, one line per frame:
//!
//! ```text
//! {"at_ms": 0, "faces": [{"box": {...}, "landmarks": [[x, y], ...], "expressions": {...}, "gender": "male"}]}
//! {"at_ms": 1000, "faces": []}
//! {"at_ms": 2000, "error": "backend lost"}
//! ```
//!
//! `at_ms` is optional and only used by replay tooling. A line with `error`
//! makes that call fail with a `PipelineError`. Blank lines and lines starting
//! with `#` are ignored.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::clock::Millis;
use crate::detect::backend::{DetectOptions, FacePipeline, PipelineError};
use crate::detect::result::FaceDetection;
use crate::frame::FrameView;

/// One scripted pipeline response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub at_ms: Option<Millis>,
    #[serde(default)]
    pub faces: Vec<FaceDetection>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse a JSON Lines detection script.
pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| anyhow!("script line {}: {}", idx + 1, e))
        })
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read detection script {}", path.display()))?;
    parse_script(&raw).with_context(|| format!("invalid detection script {}", path.display()))
}

/// Replays script steps in call order.
pub struct ScriptedPipeline {
    steps: Vec<ScriptStep>,
    cursor: usize,
    looped: bool,
}

impl ScriptedPipeline {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            cursor: 0,
            looped: false,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_script(path)?))
    }

    /// Restart from the first step once the script is exhausted.
    pub fn looping(mut self, enabled: bool) -> Self {
        self.looped = enabled;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        !self.looped && self.cursor >= self.steps.len()
    }
}

impl FacePipeline for ScriptedPipeline {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(
        &mut self,
        _view: FrameView<'_>,
        options: &DetectOptions,
    ) -> Result<Vec<FaceDetection>> {
        if self.steps.is_empty() {
            return Ok(vec![]);
        }
        let idx = if self.looped {
            self.cursor % self.steps.len()
        } else if self.cursor < self.steps.len() {
            self.cursor
        } else {
            return Ok(vec![]);
        };
        self.cursor += 1;

        let step = &self.steps[idx];
        if let Some(message) = &step.error {
            return Err(PipelineError::new(self.name(), message.clone()).into());
        }
        Ok(options.apply(step.faces.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    const SCRIPT: &str = r#"
# two frames then a failure
{"at_ms": 0, "faces": [{"box": {"x": 1, "y": 2, "width": 3, "height": 4}, "landmarks": [[1, 2]], "expressions": {"angry": 0.7}}]}
{"at_ms": 40, "faces": []}
{"error": "backend lost"}
"#;

    fn frame() -> Frame {
        Frame::from_rgba(vec![0u8; 16], 2, 2, 0).unwrap()
    }

    #[test]
    fn replays_steps_in_order_then_fails() {
        let steps = parse_script(SCRIPT).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].at_ms, Some(40));

        let mut pipeline = ScriptedPipeline::new(steps);
        let frame = frame();
        let options = DetectOptions::default();

        let first = pipeline.detect(frame.view(), &options).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].expressions.score("angry"), 0.7);
        assert!(pipeline.detect(frame.view(), &options).unwrap().is_empty());

        let err = pipeline.detect(frame.view(), &options).unwrap_err();
        let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(pipeline_err.message, "backend lost");
        assert!(pipeline.is_exhausted());
        assert!(pipeline.detect(frame.view(), &options).unwrap().is_empty());
    }

    #[test]
    fn looping_wraps_around() {
        let steps = parse_script(SCRIPT).unwrap();
        let mut pipeline = ScriptedPipeline::new(steps[..2].to_vec()).looping(true);
        let frame = frame();
        let options = DetectOptions::default();
        let sizes: Vec<usize> = (0..4)
            .map(|_| pipeline.detect(frame.view(), &options).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![1, 0, 1, 0]);
        assert!(!pipeline.is_exhausted());
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_script("{\"faces\": []}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
