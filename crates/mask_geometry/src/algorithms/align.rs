use crate::{
    error::Result,
    region::Region,
    traits::MaskTransform,
    types::{Axes, BoundingBox},
};

/// Presence cut used when locating regions to align.
pub const PRESENCE_CUT: f32 = 0.01;

/// Fraction of the subject width under which a horizontal offset is ignored.
pub const CENTER_TOLERANCE: f64 = 0.05;

/// Copy the content of `source` inside `bbox` so its top-left lands at `target`.
///
/// Content always starts at the bbox origin. A negative target is clamped to
/// zero, which pulls the copied block in from the right or bottom edge.
fn translate(region: &Region, bbox: BoundingBox, target: (i64, i64)) -> Option<Region> {
    let (width, height) = (i64::from(region.width()), i64::from(region.height()));
    let (bw, bh) = (i64::from(bbox.width()), i64::from(bbox.height()));
    let (tx, ty) = target;

    let src_x = i64::from(bbox.x_min);
    let src_y = i64::from(bbox.y_min);
    let dst_x = tx.max(0);
    let dst_y = ty.max(0);
    let copy_w = ((src_x + bw).min(width) - src_x).min((tx + bw).min(width) - dst_x);
    let copy_h = ((src_y + bh).min(height) - src_y).min((ty + bh).min(height) - dst_y);
    if copy_w <= 0 || copy_h <= 0 {
        return None;
    }

    let mut moved = Region::new(region.width(), region.height());
    for dy in 0..copy_h {
        for dx in 0..copy_w {
            let value = region.get((src_x + dx) as u32, (src_y + dy) as u32);
            moved.set((dst_x + dx) as u32, (dst_y + dy) as u32, value);
        }
    }
    Some(moved)
}

fn move_to(subject: &Region, bbox: BoundingBox, target: (i64, i64)) -> Region {
    if target == (i64::from(bbox.x_min), i64::from(bbox.y_min)) {
        return subject.clone();
    }
    match translate(subject, bbox, target) {
        Some(moved) => moved,
        None => {
            tracing::debug!(?bbox, ?target, "aligned copy is degenerate, keeping input");
            subject.clone()
        }
    }
}

/// Move the subject's bounding box onto the reference center, or onto the
/// canvas center when there is no usable reference.
///
/// Axes that are not requested keep their current offset.
pub fn align(subject: &Region, reference: Option<&Region>, axes: Axes) -> Result<Region> {
    if let Some(reference) = reference {
        subject.ensure_same_shape(reference)?;
    }
    let reference_box = reference.and_then(|r| r.bounding_box_above(PRESENCE_CUT));

    let Some(bbox) = subject.bounding_box_above(PRESENCE_CUT) else {
        return Ok(subject.clone());
    };
    if !axes.any() {
        return Ok(subject.clone());
    }

    let (x0, y0) = (i64::from(bbox.x_min), i64::from(bbox.y_min));
    let target = match reference_box {
        None => {
            let free_x = i64::from(subject.width() - bbox.width());
            let free_y = i64::from(subject.height() - bbox.height());
            (
                if axes.horizontal { (free_x / 2).clamp(0, free_x) } else { x0 },
                if axes.vertical { (free_y / 2).clamp(0, free_y) } else { y0 },
            )
        }
        Some(reference_box) => {
            let (ref_cx, ref_cy) = reference_box.center();
            let (sub_cx, sub_cy) = bbox.center();
            // Offset of the subject's own center from its origin, so aligning
            // a region to itself is a no-op.
            let half_w = i64::from(sub_cx - bbox.x_min);
            let half_h = i64::from(sub_cy - bbox.y_min);
            (
                if axes.horizontal { i64::from(ref_cx) - half_w } else { x0 },
                if axes.vertical { i64::from(ref_cy) - half_h } else { y0 },
            )
        }
    };
    tracing::trace!(?bbox, ?target, "aligning region");
    Ok(move_to(subject, bbox, target))
}

/// [`align`], then replace the output with one solid rectangle covering both
/// the reference box and the aligned subject.
///
/// Without a usable reference this is plain [`align`].
pub fn align_merged(subject: &Region, reference: Option<&Region>, axes: Axes) -> Result<Region> {
    let aligned = align(subject, reference, axes)?;
    let Some(reference_box) = reference.and_then(|r| r.bounding_box_above(PRESENCE_CUT)) else {
        return Ok(aligned);
    };
    let merged = match aligned.bounding_box_above(PRESENCE_CUT) {
        Some(aligned_box) => reference_box.union(&aligned_box),
        None => reference_box,
    };
    Ok(Region::with_rect(subject.width(), subject.height(), merged))
}

/// Horizontal-only centering that replaces the subject with a solid block.
///
/// Offsets smaller than 5% of the subject width are ignored. When the shifted
/// block would leave the canvas it is shortened on the far side rather than
/// moved back.
pub fn align_horizontal_center(subject: &Region, reference: &Region) -> Result<Region> {
    subject.ensure_same_shape(reference)?;
    let (Some(ref_box), Some(sub_box)) = (
        reference.bounding_box_above(0.0),
        subject.bounding_box_above(0.0),
    ) else {
        return Ok(subject.clone());
    };

    let width = i64::from(subject.width());
    let target = i64::from(ref_box.center().0);
    let current = i64::from(sub_box.center().0);
    let delta = target - current;
    let span = f64::from(sub_box.x_max - sub_box.x_min);
    if (delta.abs() as f64) < span * CENTER_TOLERANCE {
        return Ok(subject.clone());
    }

    let (orig_x1, orig_x2) = (i64::from(sub_box.x_min), i64::from(sub_box.x_max));
    let mut x1 = orig_x1 + delta;
    let mut x2 = orig_x2 + delta;
    if x1 < 0 {
        let overflow = -x1;
        x1 = 0;
        x2 = (orig_x2 + delta - overflow).max(0);
    }
    if x2 >= width {
        let overflow = x2 - (width - 1);
        x2 = width - 1;
        x1 = (orig_x1 + delta + overflow).min(width - 1);
    }
    let x1 = x1.max(0);
    let x2 = x2.min(width - 1);

    let mut aligned = Region::new(subject.width(), subject.height());
    if x1 <= x2 {
        aligned.fill_rect(
            BoundingBox {
                x_min: x1 as u32,
                y_min: sub_box.y_min,
                x_max: x2 as u32,
                y_max: sub_box.y_max,
            },
            1.0,
        );
    } else {
        tracing::debug!(x1, x2, "centered block collapsed after overflow correction");
    }
    Ok(aligned)
}

/// Center the occupied content on the canvas along the chosen axes.
#[derive(Debug, Clone, Copy)]
pub struct CenterOnCanvas {
    pub axes: Axes,
}

impl Default for CenterOnCanvas {
    fn default() -> Self {
        Self { axes: Axes::BOTH }
    }
}

impl MaskTransform for CenterOnCanvas {
    fn apply(&self, region: &Region) -> Result<Region> {
        align(region, None, self.axes)
    }

    fn name(&self) -> &'static str {
        "center_on_canvas"
    }
}
