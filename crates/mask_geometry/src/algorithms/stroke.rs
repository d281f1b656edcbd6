use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    blend::combine,
    morphology::{dilate, erode, smooth_binary, smooth_feather},
};
use crate::{
    error::{MaskError, Result},
    region::{OCCUPIED, Region},
    traits::MaskTransform,
    types::{BlendMode, StrokePlacement, StrokeUnit, StructuringShape},
};

/// Outline band parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StrokeSpec {
    /// Band width, in pixels or percent of the shorter canvas side
    #[schemars(range(min = 0, max = 500))]
    pub width: i32,
    #[serde(default)]
    pub placement: StrokePlacement,
    /// Blur radius used to round off the band before re-binarizing it
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub smoothing_radius: i32,
    /// Final soft-edge blur radius; the band stops being binary
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub feather_radius: i32,
    #[serde(default)]
    pub unit: StrokeUnit,
}

impl Default for StrokeSpec {
    fn default() -> Self {
        Self {
            width: 20,
            placement: StrokePlacement::External,
            smoothing_radius: 0,
            feather_radius: 0,
            unit: StrokeUnit::Pixels,
        }
    }
}

impl StrokeSpec {
    pub fn new(width: i32, placement: StrokePlacement) -> Self {
        Self {
            width,
            placement,
            ..Self::default()
        }
    }

    pub fn with_smoothing(mut self, radius: i32) -> Self {
        self.smoothing_radius = radius;
        self
    }

    pub fn with_feather(mut self, radius: i32) -> Self {
        self.feather_radius = radius;
        self
    }

    pub fn with_unit(mut self, unit: StrokeUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("width", self.width),
            ("smoothing_radius", self.smoothing_radius),
            ("feather_radius", self.feather_radius),
        ] {
            if value < 0 {
                return Err(MaskError::invalid(format!("stroke {name} must be >= 0, got {value}")));
            }
        }
        Ok(())
    }

    /// Width in pixels for a region of this size.
    pub fn pixel_width(&self, region: &Region) -> i32 {
        match self.unit {
            StrokeUnit::Pixels => self.width,
            StrokeUnit::Percent => {
                let min_side = i64::from(region.width().min(region.height()));
                (min_side * i64::from(self.width) / 100) as i32
            }
        }
    }
}

/// Build the stroke band itself.
///
/// A width of zero yields a zero-area band, not the input.
pub fn make_stroke(region: &Region, spec: &StrokeSpec) -> Result<Region> {
    spec.validate()?;
    let width = spec.pixel_width(region);
    let shape = StructuringShape::Rectangle;

    let mut band = if width <= 0 {
        Region::new(region.width(), region.height())
    } else {
        let binary = region.binarize(OCCUPIED);
        match spec.placement {
            StrokePlacement::External => {
                let grown = dilate(&binary, width, shape)?;
                combine(&grown, &binary, BlendMode::Subtract)?
            }
            StrokePlacement::Internal => {
                let shrunk = erode(&binary, width, shape)?;
                combine(&binary, &shrunk, BlendMode::Subtract)?
            }
            StrokePlacement::Center => {
                let half = (width / 2).max(1);
                let grown = dilate(&binary, half, shape)?;
                let shrunk = erode(&binary, half, shape)?;
                combine(&grown, &shrunk, BlendMode::Subtract)?
            }
        }
    };

    band = smooth_binary(&band, spec.smoothing_radius);
    band = smooth_feather(&band, spec.feather_radius);
    tracing::debug!(width, placement = %spec.placement, area = band.area(), "stroke band built");
    Ok(band)
}

/// Composite the stroke band onto the mask.
///
/// When there is nothing to draw the input comes back unchanged.
pub fn apply_stroke(region: &Region, spec: &StrokeSpec) -> Result<Region> {
    spec.validate()?;
    if spec.pixel_width(region) <= 0 && spec.smoothing_radius <= 0 && spec.feather_radius <= 0 {
        return Ok(region.clone());
    }
    let band = make_stroke(region, spec)?;
    region.zip_map(&band, f32::max)
}

impl MaskTransform for StrokeSpec {
    fn apply(&self, region: &Region) -> Result<Region> {
        make_stroke(region, self)
    }

    fn name(&self) -> &'static str {
        "stroke"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn filled_rect() -> Region {
        Region::with_rect(64, 64, BoundingBox::new(20, 20, 39, 29).unwrap())
    }

    fn intersection_is_empty(a: &Region, b: &Region) -> bool {
        combine(a, b, BlendMode::Intersect).unwrap().is_empty()
    }

    #[test]
    fn external_band_is_disjoint_and_perimeter_sized() {
        let region = filled_rect();
        let band = make_stroke(&region, &StrokeSpec::new(2, StrokePlacement::External)).unwrap();
        assert!(intersection_is_empty(&band, &region));
        // (20 + 4) x (10 + 4) minus the 20 x 10 core
        assert_eq!(band.area(), 24 * 14 - 200);
        assert_eq!(band.bounding_box(), BoundingBox::new(18, 18, 41, 31));
    }

    #[test]
    fn internal_band_stays_inside() {
        let region = filled_rect();
        let band = make_stroke(&region, &StrokeSpec::new(3, StrokePlacement::Internal)).unwrap();
        assert_eq!(band.bounding_box(), region.bounding_box());
        assert_eq!(band.area(), 200 - 14 * 4);
        assert_eq!(band.get(30, 25), 0.0);
    }

    #[test]
    fn center_band_straddles_boundary() {
        let region = filled_rect();
        let band = make_stroke(&region, &StrokeSpec::new(4, StrokePlacement::Center)).unwrap();
        assert_eq!(band.get(18, 25), 1.0);
        assert_eq!(band.get(21, 25), 1.0);
        assert_eq!(band.get(22, 25), 0.0);
        assert_eq!(band.get(17, 25), 0.0);
    }

    #[test]
    fn center_band_uses_at_least_one_pixel() {
        let region = filled_rect();
        let band = make_stroke(&region, &StrokeSpec::new(1, StrokePlacement::Center)).unwrap();
        assert_eq!(band.get(19, 25), 1.0);
        assert_eq!(band.get(20, 25), 1.0);
    }

    #[test]
    fn zero_width_band_is_empty_but_composite_is_identity() {
        let mut region = filled_rect();
        region.set(0, 0, 0.25);
        let spec = StrokeSpec::new(0, StrokePlacement::External);
        assert!(make_stroke(&region, &spec).unwrap().is_blank());
        assert_eq!(apply_stroke(&region, &spec).unwrap(), region);
    }

    #[test]
    fn composite_adds_band_to_mask() {
        let region = filled_rect();
        let spec = StrokeSpec::new(2, StrokePlacement::External);
        let composite = apply_stroke(&region, &spec).unwrap();
        assert_eq!(composite.area(), 24 * 14);
    }

    #[test]
    fn percent_width_uses_shorter_canvas_side() {
        let region = Region::new(200, 100);
        let spec = StrokeSpec::new(5, StrokePlacement::External).with_unit(StrokeUnit::Percent);
        assert_eq!(spec.pixel_width(&region), 5);
    }

    #[test]
    fn smoothing_keeps_band_binary() {
        let region = filled_rect();
        let spec = StrokeSpec::new(3, StrokePlacement::External).with_smoothing(2);
        let band = make_stroke(&region, &spec).unwrap();
        assert!(band.pixels().all(|(_, _, v)| v == 0.0 || v == 1.0));
        assert!(band.area() > 0);
    }

    #[test]
    fn negative_width_is_rejected() {
        let spec = StrokeSpec::new(-1, StrokePlacement::Internal);
        assert!(matches!(
            make_stroke(&filled_rect(), &spec),
            Err(MaskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_mask_gives_empty_band() {
        let region = Region::new(64, 64);
        let band = make_stroke(&region, &StrokeSpec::new(5, StrokePlacement::Center)).unwrap();
        assert!(band.is_empty());
    }
}
