use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    region::Region,
    traits::MaskCombiner,
    types::{AlignmentPolicy, BboxMode, BlendMode, BoundingBox},
};

/// Canvas used when a blend receives no masks at all.
pub const DEFAULT_CANVAS: u32 = 1024;

/// Result of a node-level blend.
///
/// `width`/`height` describe the occupied area, or the harmonized rectangle
/// when a bbox mode is active. Both are zero for an empty result.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendOutput {
    pub mask: Region,
    pub width: u32,
    pub height: u32,
}

/// Report of [`harmonize`]: the solid rectangle and its unclipped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harmonized {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Occupied extent along one axis; any non-zero sample counts.
fn extent(region: &Region, axis: Axis) -> Option<(u32, u32)> {
    let bbox = region.bounding_box_above(0.0)?;
    Some(match axis {
        Axis::X => (bbox.x_min, bbox.x_max),
        Axis::Y => (bbox.y_min, bbox.y_max),
    })
}

fn split(a: &Region, b: &Region, axis: Axis, keep_leading: bool) -> Region {
    let cut = match (extent(a, axis), extent(b, axis)) {
        (None, None) => return Region::new(a.width(), a.height()),
        (None, Some(_)) => return b.clone(),
        (Some(_), None) => return a.clone(),
        (Some((_, a_max)), Some((_, b_max))) => a_max.min(b_max),
    };
    Region::from_fn(a.width(), a.height(), |x, y| {
        let position = match axis {
            Axis::X => x,
            Axis::Y => y,
        };
        let kept = if keep_leading { position <= cut } else { position >= cut };
        if kept { a.get(x, y) } else { 0.0 }
    })
}

/// Pixelwise set algebra over two same-sized masks.
pub fn combine(a: &Region, b: &Region, mode: BlendMode) -> Result<Region> {
    a.ensure_same_shape(b)?;
    let combined = match mode {
        BlendMode::Union => a.zip_map(b, |p, q| (p + q).clamp(0.0, 1.0))?,
        BlendMode::Subtract => {
            if a.is_blank() {
                Region::new(a.width(), a.height())
            } else {
                a.zip_map(b, |p, q| (p - p.min(q)).clamp(0.0, 1.0))?
            }
        }
        BlendMode::Intersect => a.zip_map(b, f32::min)?,
        BlendMode::Exclude => a.zip_map(b, |p, q| 1.0 - (p + q).clamp(0.0, 1.0))?,
        BlendMode::Xor => a.zip_map(b, |p, q| (p - q).abs().clamp(0.0, 1.0))?,
        BlendMode::SplitLeft => split(a, b, Axis::X, true),
        BlendMode::SplitRight => split(a, b, Axis::X, false),
        BlendMode::SplitTop => split(a, b, Axis::Y, true),
        BlendMode::SplitBottom => split(a, b, Axis::Y, false),
    };
    Ok(combined)
}

impl MaskCombiner for BlendMode {
    fn combine(&self, a: &Region, b: &Region) -> Result<Region> {
        combine(a, b, *self)
    }
}

/// Place a rectangle derived from `bbox` according to the bbox mode.
///
/// Returns `None` for [`BboxMode::Off`]. The rectangle may extend past the
/// canvas; callers clip when drawing.
pub fn harmonized_rect(
    bbox: BoundingBox,
    mode: BboxMode,
    policy: AlignmentPolicy,
) -> Option<Harmonized> {
    let (w, h) = (bbox.width(), bbox.height());
    let (new_w, new_h) = match mode {
        BboxMode::Off => return None,
        BboxMode::Original => (w, h),
        BboxMode::SquareLonger => (w.max(h), w.max(h)),
        BboxMode::SquareShorter => (w.min(h), w.min(h)),
        BboxMode::SquareWidth => (w, w),
        BboxMode::SquareHeight => (h, h),
    };
    let (x0, y0) = (i64::from(bbox.x_min), i64::from(bbox.y_min));
    if mode == BboxMode::Original {
        return Some(Harmonized {
            x: x0,
            y: y0,
            width: new_w,
            height: new_h,
        });
    }

    let dw = i64::from(w) - i64::from(new_w);
    let dh = i64::from(h) - i64::from(new_h);
    let (x, y) = match policy {
        AlignmentPolicy::Left => (x0, y0 + dh.div_euclid(2)),
        AlignmentPolicy::Right => (x0 + dw, y0 + dh.div_euclid(2)),
        AlignmentPolicy::Top => (x0 + dw.div_euclid(2), y0),
        AlignmentPolicy::Bottom => (x0 + dw.div_euclid(2), y0 + dh),
        AlignmentPolicy::Center => (x0 + dw.div_euclid(2), y0 + dh.div_euclid(2)),
    };
    Some(Harmonized {
        x,
        y,
        width: new_w,
        height: new_h,
    })
}

/// Replace the occupied area with a solid rectangle per `mode`.
///
/// Returns the new mask and the reported `(width, height)`: the bbox size for
/// [`BboxMode::Off`], the harmonized size otherwise (before canvas clipping).
pub fn harmonize(region: &Region, mode: BboxMode, policy: AlignmentPolicy) -> (Region, u32, u32) {
    let Some(bbox) = region.bounding_box_above(0.0) else {
        return (region.clone(), 0, 0);
    };
    let Some(rect) = harmonized_rect(bbox, mode, policy) else {
        return (region.clone(), bbox.width(), bbox.height());
    };

    let mut mask = Region::new(region.width(), region.height());
    let drawn = BoundingBox::clamped(
        rect.x,
        rect.y,
        rect.x + i64::from(rect.width) - 1,
        rect.y + i64::from(rect.height) - 1,
        region.width(),
        region.height(),
    );
    if let Some(drawn) = drawn {
        mask.fill_rect(drawn, 1.0);
    }
    tracing::trace!(?rect, ?mode, ?policy, "harmonized bounding box");
    (mask, rect.width, rect.height)
}

/// Node-level blend: tolerate missing inputs, combine, then harmonize.
pub fn blend(
    a: Option<&Region>,
    b: Option<&Region>,
    mode: BlendMode,
    bbox_mode: BboxMode,
    policy: AlignmentPolicy,
) -> Result<BlendOutput> {
    let combined = match (a, b) {
        (None, None) => {
            return Ok(BlendOutput {
                mask: Region::new(DEFAULT_CANVAS, DEFAULT_CANVAS),
                width: 0,
                height: 0,
            });
        }
        (Some(a), None) => combine(a, &Region::new(a.width(), a.height()), mode)?,
        (None, Some(b)) => combine(&Region::new(b.width(), b.height()), b, mode)?,
        (Some(a), Some(b)) => combine(a, b, mode)?,
    };
    let (mask, width, height) = harmonize(&combined, bbox_mode, policy);
    Ok(BlendOutput { mask, width, height })
}
