mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{DetectOptions, FacePipeline, PipelineError};
pub use backends::{ScriptedPipeline, StubPipeline};
pub use registry::PipelineRegistry;
pub use result::{BoxRect, ExpressionScores, FaceDetection, MalformedDetection, Point};
