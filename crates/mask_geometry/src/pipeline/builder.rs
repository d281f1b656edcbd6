use crate::{
    algorithms::{CenterOnCanvas, CornerRectifier, Dilate, Erode, Feather, GrowPercent, SmoothBinary, StrokeSpec},
    pipeline::Pipeline,
    traits::MaskTransform,
    types::{Axes, StructuringShape},
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    transforms: Vec<Box<dyn MaskTransform>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Append any transform to the pipeline
    pub fn add_transform<T>(mut self, transform: T) -> Self
    where
        T: MaskTransform + 'static,
    {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn grow(self, iterations: i32, shape: StructuringShape) -> Self {
        self.add_transform(Dilate { iterations, shape })
    }

    pub fn shrink(self, iterations: i32, shape: StructuringShape) -> Self {
        self.add_transform(Erode { iterations, shape })
    }

    /// Grow (positive) or shrink (negative) by a percentage of the bbox width
    pub fn grow_percent(self, percent: f32, shape: StructuringShape) -> Self {
        self.add_transform(GrowPercent { percent, shape })
    }

    /// Replace the mask with its stroke band
    pub fn stroke(self, spec: StrokeSpec) -> Self {
        self.add_transform(spec)
    }

    pub fn smooth(self, radius: i32) -> Self {
        self.add_transform(SmoothBinary { radius })
    }

    pub fn feather(self, radius: i32) -> Self {
        self.add_transform(Feather { radius })
    }

    pub fn rectify(self, trim_fraction: f64) -> Self {
        self.add_transform(CornerRectifier { trim_fraction })
    }

    pub fn center_on_canvas(self, axes: Axes) -> Self {
        self.add_transform(CenterOnCanvas { axes })
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.transforms)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
