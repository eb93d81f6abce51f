pub mod scripted;
pub mod stub;

pub use scripted::{load_script, parse_script, ScriptStep, ScriptedPipeline};
pub use stub::StubPipeline;
