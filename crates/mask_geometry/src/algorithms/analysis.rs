use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::morphology::ShrinkBudget;
use crate::{
    error::{MaskError, Result},
    region::{OCCUPIED, Region},
    types::BoundingBox,
};

/// Per-edge growth in percent of the occupied extent on that axis.
///
/// Positive values push the edge outward, negative values pull it in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeExpansion {
    #[serde(default)]
    #[schemars(range(min = -90, max = 1000))]
    pub top: i32,
    #[serde(default)]
    #[schemars(range(min = -90, max = 1000))]
    pub bottom: i32,
    #[serde(default)]
    #[schemars(range(min = -90, max = 1000))]
    pub left: i32,
    #[serde(default)]
    #[schemars(range(min = -90, max = 1000))]
    pub right: i32,
}

impl EdgeExpansion {
    pub const MIN_PERCENT: i32 = -90;
    pub const MAX_PERCENT: i32 = 1000;

    pub fn validate(&self) -> Result<()> {
        for (edge, value) in [
            ("top", self.top),
            ("bottom", self.bottom),
            ("left", self.left),
            ("right", self.right),
        ] {
            if !(Self::MIN_PERCENT..=Self::MAX_PERCENT).contains(&value) {
                return Err(MaskError::invalid(format!(
                    "{edge} expansion {value}% outside {}..={}",
                    Self::MIN_PERCENT,
                    Self::MAX_PERCENT
                )));
            }
        }
        Ok(())
    }
}

/// Mask plus the scalars reported by [`expand_edges`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    pub mask: Region,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub mask_width: u32,
    pub mask_height: u32,
    pub center_x: u32,
    pub center_y: u32,
}

/// Edge percentages after the shrink budget, truncated toward zero.
fn budgeted(first: i32, second: i32) -> (i64, i64) {
    let (a, b) = ShrinkBudget::default().clamp_pair(f64::from(first), f64::from(second));
    (a.trunc() as i64, b.trunc() as i64)
}

fn edge_pixels(extent: u32, percent: i64) -> i64 {
    let magnitude = i64::from(extent) * percent.abs() / 100;
    if percent < 0 { -magnitude } else { magnitude }
}

/// Replace the occupied area with a solid rectangle whose edges were moved
/// by the given percentages.
pub fn expand_edges(region: &Region, expansion: EdgeExpansion) -> Result<AnalysisOutput> {
    expansion.validate()?;
    let (canvas_width, canvas_height) = region.dimensions();
    let Some(bbox) = region.bounding_box() else {
        return Ok(AnalysisOutput {
            mask: region.clone(),
            canvas_width,
            canvas_height,
            mask_width: canvas_width,
            mask_height: canvas_height,
            center_x: canvas_width / 2,
            center_y: canvas_height / 2,
        });
    };

    let (top, bottom) = budgeted(expansion.top, expansion.bottom);
    let (left, right) = budgeted(expansion.left, expansion.right);
    let top = edge_pixels(bbox.height(), top);
    let bottom = edge_pixels(bbox.height(), bottom);
    let left = edge_pixels(bbox.width(), left);
    let right = edge_pixels(bbox.width(), right);

    let mut y_min = (i64::from(bbox.y_min) - top).max(0);
    let mut y_max = (i64::from(bbox.y_max) + bottom).min(i64::from(canvas_height) - 1);
    let mut x_min = (i64::from(bbox.x_min) - left).max(0);
    let mut x_max = (i64::from(bbox.x_max) + right).min(i64::from(canvas_width) - 1);
    if y_min > y_max {
        tracing::debug!(y_min, y_max, "vertical expansion inverted, keeping original rows");
        (y_min, y_max) = (i64::from(bbox.y_min), i64::from(bbox.y_max));
    }
    if x_min > x_max {
        tracing::debug!(x_min, x_max, "horizontal expansion inverted, keeping original columns");
        (x_min, x_max) = (i64::from(bbox.x_min), i64::from(bbox.x_max));
    }

    let expanded = BoundingBox {
        x_min: x_min as u32,
        y_min: y_min as u32,
        x_max: x_max as u32,
        y_max: y_max as u32,
    };
    let (center_x, center_y) = expanded.center();
    Ok(AnalysisOutput {
        mask: Region::with_rect(canvas_width, canvas_height, expanded),
        canvas_width,
        canvas_height,
        mask_width: expanded.width(),
        mask_height: expanded.height(),
        center_x,
        center_y,
    })
}

/// Whether the mask holds anything above 0.5, optionally requiring the
/// occupied share of the canvas to reach `min_area_percent`.
pub fn detect(region: &Region, min_area_percent: f64) -> bool {
    let occupied = region.pixels().filter(|&(_, _, v)| v > OCCUPIED).count();
    if occupied == 0 {
        return false;
    }
    if min_area_percent <= 0.0 {
        return true;
    }
    let total = u64::from(region.width()) * u64::from(region.height());
    let ratio = occupied as f64 / total as f64 * 100.0;
    ratio >= min_area_percent
}

/// Pixel sizes derived from percentages of the occupied width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioOutput {
    pub grow_pixels: i64,
    pub grow: f64,
    pub blur_pixels: i64,
    pub blur: f64,
}

pub fn ratio_pixels(region: &Region, grow_percent: f64, blur_percent: f64) -> RatioOutput {
    let width = region.bounding_box().map_or(0.0, |b| f64::from(b.width()));
    let grow = (width * grow_percent / 100.0).trunc();
    let blur = (width * blur_percent / 100.0).trunc();
    RatioOutput {
        grow_pixels: grow as i64,
        grow,
        blur_pixels: blur as i64,
        blur,
    }
}

/// Margins added around the occupied area before cropping, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropExtend {
    #[serde(default)]
    #[schemars(range(max = 4096))]
    pub top: u32,
    #[serde(default)]
    #[schemars(range(max = 4096))]
    pub bottom: u32,
    #[serde(default)]
    #[schemars(range(max = 4096))]
    pub left: u32,
    #[serde(default)]
    #[schemars(range(max = 4096))]
    pub right: u32,
}

impl CropExtend {
    pub const MAX_MARGIN: u32 = 4096;

    pub fn validate(&self) -> Result<()> {
        for (edge, value) in [
            ("top", self.top),
            ("bottom", self.bottom),
            ("left", self.left),
            ("right", self.right),
        ] {
            if value > Self::MAX_MARGIN {
                return Err(MaskError::invalid(format!(
                    "{edge} margin {value} exceeds {}",
                    Self::MAX_MARGIN
                )));
            }
        }
        Ok(())
    }
}

/// A crop rectangle that may reach past the canvas.
///
/// `source` is the part that lies on the canvas; the paddings say how far the
/// requested window extends beyond each edge.
#[derive(Debug, Clone, PartialEq)]
pub struct CropWindow {
    pub source: BoundingBox,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pad_left: u32,
    pub pad_right: u32,
    /// Target-sized mask with ones in the padded bands.
    pub boundary: Region,
}

impl CropWindow {
    pub fn target_width(&self) -> u32 {
        self.pad_left + self.source.width() + self.pad_right
    }

    pub fn target_height(&self) -> u32 {
        self.pad_top + self.source.height() + self.pad_bottom
    }

    pub fn out_of_bounds(&self) -> bool {
        self.pad_top + self.pad_bottom + self.pad_left + self.pad_right > 0
    }

    /// Crop `region` to the window, filling the padding with `pad_value`.
    pub fn apply(&self, region: &Region, pad_value: f32) -> Region {
        let source = self.source;
        Region::from_fn(self.target_width(), self.target_height(), |x, y| {
            let inside_x = x >= self.pad_left && x < self.pad_left + source.width();
            let inside_y = y >= self.pad_top && y < self.pad_top + source.height();
            if inside_x && inside_y {
                region.get(source.x_min + x - self.pad_left, source.y_min + y - self.pad_top)
            } else {
                pad_value
            }
        })
    }
}

/// Window around the occupied area (any non-zero sample) grown by `extend`.
pub fn crop_window(region: &Region, extend: CropExtend) -> Result<CropWindow> {
    extend.validate()?;
    let bbox = region
        .bounding_box_above(0.0)
        .ok_or_else(|| MaskError::EmptyRegion("mask has no non-zero pixels to crop around".into()))?;
    let (width, height) = (i64::from(region.width()), i64::from(region.height()));

    // Half-open window
    let y0 = i64::from(bbox.y_min) - i64::from(extend.top);
    let y1 = i64::from(bbox.y_max) + 1 + i64::from(extend.bottom);
    let x0 = i64::from(bbox.x_min) - i64::from(extend.left);
    let x1 = i64::from(bbox.x_max) + 1 + i64::from(extend.right);

    let pad_top = (-y0).max(0) as u32;
    let pad_bottom = (y1 - height).max(0) as u32;
    let pad_left = (-x0).max(0) as u32;
    let pad_right = (x1 - width).max(0) as u32;
    let source = BoundingBox {
        x_min: x0.max(0) as u32,
        y_min: y0.max(0) as u32,
        x_max: (x1.min(width) - 1) as u32,
        y_max: (y1.min(height) - 1) as u32,
    };

    let target_width = (x1 - x0) as u32;
    let target_height = (y1 - y0) as u32;
    let boundary = Region::from_fn(target_width, target_height, |x, y| {
        let padded = y < pad_top
            || y >= target_height - pad_bottom
            || x < pad_left
            || x >= target_width - pad_right;
        if padded { 1.0 } else { 0.0 }
    });

    let window = CropWindow {
        source,
        pad_top,
        pad_bottom,
        pad_left,
        pad_right,
        boundary,
    };
    tracing::trace!(?source, out_of_bounds = window.out_of_bounds(), "crop window");
    Ok(window)
}
