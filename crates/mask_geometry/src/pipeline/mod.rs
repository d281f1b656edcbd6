pub mod builder;

use crate::{error::Result, region::Region, traits::MaskTransform};

/// An ordered chain of single-input mask operations
pub struct Pipeline {
    transforms: Vec<Box<dyn MaskTransform>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(transforms: Vec<Box<dyn MaskTransform>>) -> Self {
        Self { transforms }
    }

    /// Run the region through every step in order
    pub fn process(&self, region: &Region) -> Result<Region> {
        let mut current = region.clone();
        for transform in &self.transforms {
            current = transform.apply(&current)?;
            tracing::trace!(step = transform.name(), area = current.area(), "pipeline step done");
        }
        Ok(current)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let steps: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        format!("Pipeline: {} steps [{}]", steps.len(), steps.join(" -> "))
    }
}
