use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::FacePipeline;

/// Registry of available perception pipelines, selected by name at startup.
///
/// The capture loop owns exactly one pipeline, so selection moves it out of the
/// registry.
pub struct PipelineRegistry {
    pipelines: HashMap<String, Box<dyn FacePipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// Register a pipeline under its own name, replacing any earlier one.
    pub fn register<P: FacePipeline + 'static>(&mut self, pipeline: P) {
        let name = pipeline.name().to_string();
        self.pipelines.insert(name, Box::new(pipeline));
    }

    /// List registered pipelines, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return a pipeline by name.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn FacePipeline>> {
        self.pipelines.remove(name).ok_or_else(|| {
            anyhow!(
                "pipeline '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{ScriptedPipeline, StubPipeline};

    #[test]
    fn take_moves_pipeline_out() {
        let mut registry = PipelineRegistry::new();
        registry.register(StubPipeline::new());
        registry.register(ScriptedPipeline::new(vec![]));
        assert_eq!(registry.list(), vec!["scripted", "stub"]);

        let pipeline = registry.take("stub").unwrap();
        assert_eq!(pipeline.name(), "stub");
        assert_eq!(registry.list(), vec!["scripted"]);
        assert!(registry.take("stub").is_err());
    }

    #[test]
    fn unknown_name_lists_available() {
        let mut registry = PipelineRegistry::new();
        registry.register(StubPipeline::new());
        registry.register(ScriptedPipeline::new(vec![]));

        let err = registry.take("onnx").err().unwrap();
        assert!(err.to_string().contains("available: scripted, stub"));
    }

    #[test]
    fn later_registration_replaces_same_name() {
        let mut registry = PipelineRegistry::new();
        registry.register(ScriptedPipeline::new(vec![]));
        registry.register(ScriptedPipeline::new(vec![]).looping(true));
        assert_eq!(registry.list(), vec!["scripted"]);
    }
}
