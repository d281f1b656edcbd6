//! # Mask Geometry Library
//!
//! Geometric operations on 2D occupancy masks: bounding boxes, alignment,
//! morphological grow/shrink, stroke bands, corner rectification, boolean
//! set algebra and bounding-box harmonization.
//!
//! ## Core Features
//!
//! - **Value semantics**: every operation takes a [`Region`] by reference and returns a new one
//! - **Pipeline System**: chain single-input operations through [`MaskTransform`]
//! - **Typed commands**: [`MaskCommand`] describes a node invocation with validated parameters
//! - **Degenerate inputs**: empty, full and single-pixel masks have documented fallbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mask_geometry::{Pipeline, StrokePlacement, StrokeSpec, StructuringShape, load_mask, save_mask};
//!
//! let mask = load_mask("mask.png")?;
//! let pipeline = Pipeline::builder()
//!     .grow(4, StructuringShape::Ellipse)
//!     .stroke(StrokeSpec::new(6, StrokePlacement::External))
//!     .build();
//! let outline = pipeline.process(&mask)?;
//! save_mask(&outline, "outline.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Node Commands
//!
//! ```rust,no_run
//! use mask_geometry::{BlendMode, BboxMode, AlignmentPolicy, MaskCommand, MaskManager, load_mask};
//!
//! let a = load_mask("a.png")?;
//! let b = load_mask("b.png")?;
//! let command = MaskCommand::Blend {
//!     mode: BlendMode::Union,
//!     bbox_mode: BboxMode::SquareLonger,
//!     policy: AlignmentPolicy::Center,
//! };
//! let output = MaskManager::new().execute(&command, Some(&a), Some(&b))?;
//! println!("{}x{}", output.width, output.height);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod region;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod io;
pub mod manager;

pub use error::{MaskError, Result};
pub use types::*;
pub use region::{MaskImage, OCCUPIED, Region};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{Pipeline, builder::PipelineBuilder};
pub use io::*;
pub use manager::{BatchItem, MaskCommand, MaskManager, NodeOutput, Pinned};

#[cfg(test)]
mod tests {
    use super::*;

    fn rounded_card() -> Region {
        let rect = BoundingBox::new(20, 20, 79, 59).unwrap();
        Region::from_fn(100, 80, |x, y| {
            if !rect.contains(x, y) {
                return 0.0;
            }
            let (x, y) = (i64::from(x), i64::from(y));
            let cx = x.clamp(26, 73);
            let cy = y.clamp(26, 53);
            if (x - cx).pow(2) + (y - cy).pow(2) <= 36 { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_pipeline_basic() {
        let pipeline = Pipeline::builder().build();
        let region = rounded_card();
        let result = pipeline.process(&region).expect("Should process successfully");
        assert_eq!(result, region);
    }

    #[test]
    fn test_rectify_then_stroke() {
        let pipeline = Pipeline::builder()
            .rectify(0.15)
            .stroke(StrokeSpec::new(2, StrokePlacement::External))
            .build();
        let band = pipeline.process(&rounded_card()).expect("Should process successfully");
        let bbox = band.bounding_box().expect("band should not be empty");
        assert!(bbox.x_min.abs_diff(18) <= 1 && bbox.y_min.abs_diff(18) <= 1);
        assert!(bbox.x_max.abs_diff(81) <= 1 && bbox.y_max.abs_diff(61) <= 1);
    }

    #[test]
    fn test_manager_matches_direct_call() {
        let region = rounded_card();
        let command = MaskCommand::Dilate {
            iterations: 3,
            shape: StructuringShape::Ellipse,
        };
        let output = MaskManager::new()
            .execute(&command, Some(&region), None)
            .expect("Should execute successfully");
        let direct = dilate(&region, 3, StructuringShape::Ellipse).unwrap();
        assert_eq!(output.mask, direct);
        assert_eq!((output.width, output.height), (66, 46));
    }

    #[test]
    fn test_combiner_trait_object() {
        let combiners: Vec<Box<dyn MaskCombiner>> =
            vec![Box::new(BlendMode::Union), Box::new(BlendMode::Intersect)];
        let a = Region::with_rect(10, 10, BoundingBox::new(0, 0, 5, 5).unwrap());
        let b = Region::with_rect(10, 10, BoundingBox::new(3, 3, 9, 9).unwrap());
        let areas: Vec<usize> = combiners
            .iter()
            .map(|c| c.combine(&a, &b).unwrap().area())
            .collect();
        assert_eq!(areas, vec![36 + 49 - 9, 9]);
    }
}
