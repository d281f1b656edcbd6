use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

/// Inclusive pixel bounds of the occupied part of a region.
///
/// A box always covers at least one pixel; empty regions have no box at all
/// (see [`crate::Region::bounding_box`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    /// Returns `None` when the corners are inverted.
    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Option<Self> {
        (x_min <= x_max && y_min <= y_max).then_some(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Build a box from signed corners, rejecting anything outside `0..width` / `0..height`
    /// after clamping or with inverted corners.
    pub fn clamped(
        x_min: i64,
        y_min: i64,
        x_max: i64,
        y_max: i64,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let x0 = x_min.max(0);
        let y0 = y_min.max(0);
        let x1 = x_max.min(i64::from(width) - 1);
        let y1 = y_max.min(i64::from(height) - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Self::new(x0 as u32, y0 as u32, x1 as u32, y1 as u32)
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Integer midpoint of the box (geometric center, not centroid of mass).
    pub fn center(&self) -> (u32, u32) {
        ((self.x_min + self.x_max) / 2, (self.y_min + self.y_max) / 2)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

/// Neighborhood used by dilation and erosion. Always a 3x3 element.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StructuringShape {
    /// Full 3x3 square (Chebyshev distance).
    #[default]
    Rectangle,
    /// 3x3 ellipse, which is the 4-neighborhood cross (Manhattan distance).
    Ellipse,
}

impl StructuringShape {
    pub(crate) fn norm(self) -> imageproc::distance_transform::Norm {
        use imageproc::distance_transform::Norm;
        match self {
            Self::Rectangle => Norm::LInf,
            Self::Ellipse => Norm::L1,
        }
    }
}

/// Where a stroke band sits relative to the region boundary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrokePlacement {
    #[default]
    External,
    Internal,
    Center,
}

/// How a stroke width is measured.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrokeUnit {
    #[default]
    Pixels,
    /// Percent of the shorter canvas side.
    Percent,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlignmentPolicy {
    Left,
    Right,
    #[default]
    Center,
    Top,
    Bottom,
}

/// Bounding-box harmonization applied after blending.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BboxMode {
    #[default]
    Off,
    /// Solid rectangle over the combined bounding box.
    Original,
    SquareLonger,
    SquareShorter,
    SquareWidth,
    SquareHeight,
}

/// Boolean combination of two masks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Union,
    Subtract,
    Intersect,
    /// Occupied where neither mask is occupied (logical NOR).
    Exclude,
    /// Occupied where exactly one mask is occupied.
    Xor,
    SplitLeft,
    SplitRight,
    SplitTop,
    SplitBottom,
}

/// Axes an alignment is allowed to move along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Axes {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Axes {
    pub const BOTH: Self = Self {
        horizontal: true,
        vertical: true,
    };
    pub const HORIZONTAL: Self = Self {
        horizontal: true,
        vertical: false,
    };
    pub const VERTICAL: Self = Self {
        horizontal: false,
        vertical: true,
    };

    pub fn any(&self) -> bool {
        self.horizontal || self.vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn bounding_box_rejects_inverted_corners() {
        assert!(BoundingBox::new(5, 5, 4, 5).is_none());
        let b = BoundingBox::new(10, 10, 10, 10).unwrap();
        assert_eq!((b.width(), b.height()), (1, 1));
        assert_eq!(b.center(), (10, 10));
    }

    #[test]
    fn clamped_box_stays_on_canvas() {
        let b = BoundingBox::clamped(-4, -2, 120, 30, 100, 50).unwrap();
        assert_eq!(b, BoundingBox::new(0, 0, 99, 30).unwrap());
        assert!(BoundingBox::clamped(100, 0, 120, 10, 100, 50).is_none());
    }

    #[test]
    fn enums_parse_snake_case() {
        assert_eq!(BlendMode::from_str("split_left").unwrap(), BlendMode::SplitLeft);
        assert_eq!(BboxMode::SquareLonger.to_string(), "square_longer");
        let json = serde_json::to_string(&StrokePlacement::Internal).unwrap();
        assert_eq!(json, "\"internal\"");
    }
}
