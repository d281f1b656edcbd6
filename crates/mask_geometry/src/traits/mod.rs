use crate::{error::Result, region::Region};

/// A single-input mask operation (grow, shrink, stroke, rectify, ...)
pub trait MaskTransform: Send + Sync {
    /// Produce a new region from the input; the input is never modified
    fn apply(&self, region: &Region) -> Result<Region>;

    /// Short name used in logs and pipeline descriptions
    fn name(&self) -> &'static str;
}

/// A two-input mask operation over same-sized regions
pub trait MaskCombiner: Send + Sync {
    fn combine(&self, a: &Region, b: &Region) -> Result<Region>;
}
