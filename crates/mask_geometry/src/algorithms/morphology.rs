use image::GrayImage;
use imageproc::{distance_transform::Norm, morphology};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MaskError, Result},
    region::{OCCUPIED, Region},
    traits::MaskTransform,
    types::StructuringShape,
};

/// Largest radius handed to imageproc in one pass. Its distance transform
/// saturates at 255, so 255 itself would treat "no pixel found" as in range.
const MAX_PASS_RADIUS: u32 = 254;

/// Re-binarization cut applied after `smooth_binary` (10 on the 8-bit scale).
pub const SMOOTH_CUT: f32 = 10.0 / 255.0;

fn checked_iterations(iterations: i32) -> Result<u32> {
    u32::try_from(iterations)
        .map_err(|_| MaskError::invalid(format!("iteration count must be >= 0, got {iterations}")))
}

fn apply_passes(
    mut image: GrayImage,
    norm: Norm,
    iterations: u32,
    op: fn(&GrayImage, Norm, u8) -> GrayImage,
) -> GrayImage {
    let mut remaining = iterations;
    while remaining > 0 {
        let k = remaining.min(MAX_PASS_RADIUS);
        image = op(&image, norm, k as u8);
        remaining -= k;
    }
    image
}

/// Grow the occupied set by `iterations` applications of a 3x3 element.
///
/// `iterations == 0` returns the input unchanged; negative counts are rejected.
pub fn dilate(region: &Region, iterations: i32, shape: StructuringShape) -> Result<Region> {
    let iterations = checked_iterations(iterations)?;
    if iterations == 0 {
        return Ok(region.clone());
    }
    let binary = region.binarize(OCCUPIED);
    if binary.is_empty() {
        return Ok(binary);
    }
    let grown = apply_passes(binary.to_gray(), shape.norm(), iterations, morphology::dilate);
    Ok(Region::from_gray(&grown))
}

/// Shrink the occupied set by `iterations` applications of a 3x3 element.
///
/// Pixels outside the canvas count as occupied, so the border itself does not erode.
pub fn erode(region: &Region, iterations: i32, shape: StructuringShape) -> Result<Region> {
    let iterations = checked_iterations(iterations)?;
    if iterations == 0 {
        return Ok(region.clone());
    }
    let binary = region.binarize(OCCUPIED);
    if binary.is_empty() || binary.area() == binary.width() as usize * binary.height() as usize {
        return Ok(binary);
    }
    let shrunk = apply_passes(binary.to_gray(), shape.norm(), iterations, morphology::erode);
    Ok(Region::from_gray(&shrunk))
}

/// Morphological closing (dilate then erode) with a `(2r+1)`-sized element.
pub fn close(region: &Region, radius: i32, shape: StructuringShape) -> Result<Region> {
    let grown = dilate(region, radius, shape)?;
    erode(&grown, radius, shape)
}

fn blur(region: &Region, sigma: f32) -> Region {
    let blurred = imageproc::filter::gaussian_blur_f32(&region.to_gray(), sigma);
    Region::from_gray(&blurred)
}

/// Soften the edges of a binary mask and snap it back to binary.
///
/// The blur uses `sigma = radius`; anything above ~4% intensity survives.
pub fn smooth_binary(region: &Region, radius: i32) -> Region {
    if radius <= 0 {
        return region.clone();
    }
    blur(region, radius as f32).map(|v| if v > SMOOTH_CUT { 1.0 } else { 0.0 })
}

/// Gaussian feathering with `sigma = radius`, keeping the fractional result.
pub fn smooth_feather(region: &Region, radius: i32) -> Region {
    if radius <= 0 {
        return region.clone();
    }
    blur(region, radius as f32)
}

/// Gaussian feathering specified by an odd kernel size.
///
/// Even sizes are bumped to the next odd size and sigma is derived from the
/// size as `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub fn feather_kernel(region: &Region, kernel_size: u32) -> Region {
    if kernel_size == 0 {
        return region.clone();
    }
    let k = if kernel_size % 2 == 0 { kernel_size + 1 } else { kernel_size };
    let sigma = 0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    blur(region, sigma)
}

/// Convert a percentage of the region's bounding-box width into whole pixels.
pub fn pixels_from_percent(region: &Region, percent: f32) -> u32 {
    region
        .bounding_box()
        .map(|b| (b.width() as f32 * percent.abs() / 100.0) as u32)
        .unwrap_or(0)
}

/// Grow (positive) or shrink (negative) by a percentage of the bbox width.
pub fn grow_percent(region: &Region, percent: f32, shape: StructuringShape) -> Result<Region> {
    let pixels = pixels_from_percent(region, percent) as i32;
    if percent > 0.0 {
        dilate(region, pixels, shape)
    } else {
        erode(region, pixels, shape)
    }
}

/// Proportional limit on independently specified edge shrinks.
///
/// Negative edge values are percentages of an axis extent. When their sum
/// would consume more than 90% of the axis they are scaled down together so
/// at least 10% of the extent remains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShrinkBudget {
    pub max_total_percent: f64,
}

impl Default for ShrinkBudget {
    fn default() -> Self {
        Self {
            max_total_percent: 90.0,
        }
    }
}

impl ShrinkBudget {
    /// Clamp a pair of opposite edge percentages (e.g. top/bottom).
    pub fn clamp_pair(&self, first: f64, second: f64) -> (f64, f64) {
        let total = (-first).max(0.0) + (-second).max(0.0);
        if total <= self.max_total_percent {
            return (first, second);
        }
        let scale = self.max_total_percent / total;
        let scaled = |v: f64| if v < 0.0 { v * scale } else { v };
        tracing::debug!(total, scale, "edge shrink exceeds budget, scaling down");
        (scaled(first), scaled(second))
    }
}

/// Parameters of the percentage grow/blur node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GrowBlurConfig {
    /// Grow (positive) or shrink (negative), percent of the bbox width
    #[schemars(range(min = -500.0, max = 1000.0))]
    pub grow_percent: f32,
    /// Gaussian kernel size, percent of the bbox width
    #[schemars(range(min = 0.0, max = 500.0))]
    pub blur_percent: f32,
    /// Close small holes after growing, using a closing of radius 2.
    ///
    /// With `rounded` the element is the 13 pixel L1 diamond, slightly
    /// narrower than a 21 pixel 5x5 disk, so holes touching a diagonal
    /// boundary can stay open where the disk would have closed them.
    #[serde(default)]
    pub fill_holes: bool,
    /// Use the rounded (ellipse) element instead of the square one
    #[serde(default)]
    pub rounded: bool,
}

impl GrowBlurConfig {
    pub fn validate(&self) -> Result<()> {
        if !(-500.0..=1000.0).contains(&self.grow_percent) {
            return Err(MaskError::invalid(format!(
                "grow_percent {} outside -500..=1000",
                self.grow_percent
            )));
        }
        if !(0.0..=500.0).contains(&self.blur_percent) {
            return Err(MaskError::invalid(format!(
                "blur_percent {} outside 0..=500",
                self.blur_percent
            )));
        }
        Ok(())
    }

    fn shape(&self) -> StructuringShape {
        if self.rounded {
            StructuringShape::Ellipse
        } else {
            StructuringShape::Rectangle
        }
    }

    /// Returns the processed mask and its inverse.
    pub fn run(&self, region: &Region) -> Result<(Region, Region)> {
        self.validate()?;
        let mut mask = region.binarize(OCCUPIED);
        let reference_width = mask.bounding_box().map(|b| b.width()).unwrap_or(0) as f32;
        let grow_pixels = (reference_width * self.grow_percent.abs() / 100.0) as i32;
        let blur_pixels = (reference_width * self.blur_percent / 100.0) as u32;

        if grow_pixels > 0 {
            mask = if self.grow_percent > 0.0 {
                dilate(&mask, grow_pixels, self.shape())?
            } else {
                erode(&mask, grow_pixels, self.shape())?
            };
        }
        if self.fill_holes {
            mask = close(&mask, 2, self.shape())?;
        }
        if blur_pixels > 0 {
            mask = feather_kernel(&mask, blur_pixels);
        }
        tracing::debug!(grow_pixels, blur_pixels, "grow/blur applied");
        let inverted = mask.invert();
        Ok((mask, inverted))
    }
}

/// Dilation as a pipeline step
#[derive(Debug, Clone, Copy, Default)]
pub struct Dilate {
    pub iterations: i32,
    pub shape: StructuringShape,
}

impl MaskTransform for Dilate {
    fn apply(&self, region: &Region) -> Result<Region> {
        dilate(region, self.iterations, self.shape)
    }

    fn name(&self) -> &'static str {
        "dilate"
    }
}

/// Erosion as a pipeline step
#[derive(Debug, Clone, Copy, Default)]
pub struct Erode {
    pub iterations: i32,
    pub shape: StructuringShape,
}

impl MaskTransform for Erode {
    fn apply(&self, region: &Region) -> Result<Region> {
        erode(region, self.iterations, self.shape)
    }

    fn name(&self) -> &'static str {
        "erode"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrowPercent {
    pub percent: f32,
    pub shape: StructuringShape,
}

impl MaskTransform for GrowPercent {
    fn apply(&self, region: &Region) -> Result<Region> {
        grow_percent(region, self.percent, self.shape)
    }

    fn name(&self) -> &'static str {
        "grow_percent"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothBinary {
    pub radius: i32,
}

impl MaskTransform for SmoothBinary {
    fn apply(&self, region: &Region) -> Result<Region> {
        Ok(smooth_binary(region, self.radius))
    }

    fn name(&self) -> &'static str {
        "smooth_binary"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Feather {
    pub radius: i32,
}

impl MaskTransform for Feather {
    fn apply(&self, region: &Region) -> Result<Region> {
        Ok(smooth_feather(region, self.radius))
    }

    fn name(&self) -> &'static str {
        "feather"
    }
}

impl MaskTransform for GrowBlurConfig {
    fn apply(&self, region: &Region) -> Result<Region> {
        self.run(region).map(|(mask, _)| mask)
    }

    fn name(&self) -> &'static str {
        "grow_blur"
    }
}
