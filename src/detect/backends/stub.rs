use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::{DetectOptions, FacePipeline};
use crate::detect::result::{BoxRect, ExpressionScores, FaceDetection, Point};
use crate::frame::FrameView;

/// Labels produced by the stub, in the order a face-expression model reports them.
pub const STUB_EXPRESSIONS: [&str; 7] = [
    "neutral",
    "happy",
    "sad",
    "angry",
    "fearful",
    "disgusted",
    "surprised",
];

/// Stub pipeline for wiring and demos.
///
/// Emits one centred face per frame. Expression scores are derived from a hash
/// of the pixels, so identical frames give identical scores and changing frames
/// give a noisy, frame-to-frame signal.
#[derive(Default)]
pub struct StubPipeline;

impl StubPipeline {
    pub fn new() -> Self {
        Self
    }
}

impl FacePipeline for StubPipeline {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        view: FrameView<'_>,
        options: &DetectOptions,
    ) -> Result<Vec<FaceDetection>> {
        if view.width() == 0 || view.height() == 0 {
            return Ok(vec![]);
        }
        let digest: [u8; 32] = Sha256::digest(view.pixels()).into();

        let weights: Vec<f32> = digest[..STUB_EXPRESSIONS.len()]
            .iter()
            .map(|b| *b as f32 + 1.0)
            .collect();
        let total: f32 = weights.iter().sum();
        let expressions: ExpressionScores = STUB_EXPRESSIONS
            .iter()
            .zip(&weights)
            .map(|(label, w)| (*label, w / total))
            .collect();

        let (w, h) = (view.width() as f32, view.height() as f32);
        let bbox = BoxRect::new(w * 0.35, h * 0.25, w * 0.3, h * 0.4);
        let landmarks = vec![
            Point(bbox.x + bbox.width * 0.3, bbox.y + bbox.height * 0.35),
            Point(bbox.x + bbox.width * 0.7, bbox.y + bbox.height * 0.35),
            Point(bbox.x + bbox.width * 0.5, bbox.y + bbox.height * 0.55),
            Point(bbox.x + bbox.width * 0.35, bbox.y + bbox.height * 0.75),
            Point(bbox.x + bbox.width * 0.65, bbox.y + bbox.height * 0.75),
        ];

        let face = FaceDetection {
            bbox: Some(bbox),
            score: 0.5 + digest[8] as f32 / 510.0,
            landmarks,
            expressions,
            gender: if digest[9] % 2 == 0 { "female" } else { "male" }.to_string(),
            gender_probability: Some(0.5 + digest[10] as f32 / 510.0),
            age: Some(18.0 + (digest[11] % 50) as f32),
        };
        Ok(options.apply(vec![face]))
    }
}
