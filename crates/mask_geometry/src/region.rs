use image::{GrayImage, ImageBuffer, Luma};

use crate::{
    error::{MaskError, Result},
    types::BoundingBox,
};

/// Floating point single channel mask buffer.
pub type MaskImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Values at or above this cut count as occupied.
pub const OCCUPIED: f32 = 0.5;

/// A 2D occupancy mask with values conventionally in `[0, 1]`.
///
/// Operations never mutate a region they receive; they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    image: MaskImage,
}

impl Region {
    /// All-empty region of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width, height),
        }
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            image: ImageBuffer::from_pixel(width, height, Luma([value])),
        }
    }

    pub fn from_image(image: MaskImage) -> Self {
        Self { image }
    }

    /// Build a region from row-major samples.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let len = data.len();
        ImageBuffer::from_raw(width, height, data)
            .map(Self::from_image)
            .ok_or_else(|| {
                MaskError::invalid(format!(
                    "{len} samples cannot fill a {width}x{height} mask"
                ))
            })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        Self {
            image: ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)])),
        }
    }

    /// Region holding a solid rectangle of ones.
    pub fn with_rect(width: u32, height: u32, rect: BoundingBox) -> Self {
        let mut region = Self::new(width, height);
        region.fill_rect(rect, 1.0);
        region
    }

    pub fn from_gray(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            f32::from(image.get_pixel(x, y)[0]) / 255.0
        })
    }

    /// 8-bit view of the mask, clamping to `[0, 1]`.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([(self.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.image.get_pixel(x, y)[0]
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.image.put_pixel(x, y, Luma([value]));
    }

    pub fn as_image(&self) -> &MaskImage {
        &self.image
    }

    pub fn into_image(self) -> MaskImage {
        self.image
    }

    /// Iterate `(x, y, value)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, f32)> + '_ {
        self.image.enumerate_pixels().map(|(x, y, p)| (x, y, p[0]))
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_fn(self.width(), self.height(), |x, y| f(self.get(x, y)))
    }

    /// Pixelwise combination of two same-sized regions.
    pub fn zip_map(&self, other: &Region, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        self.ensure_same_shape(other)?;
        Ok(Self::from_fn(self.width(), self.height(), |x, y| {
            f(self.get(x, y), other.get(x, y))
        }))
    }

    /// Bounding box of pixels at or above [`OCCUPIED`]; `None` when empty.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box_where(|v| v >= OCCUPIED)
    }

    /// Bounding box of pixels strictly above `cut`.
    pub fn bounding_box_above(&self, cut: f32) -> Option<BoundingBox> {
        self.bounding_box_where(|v| v > cut)
    }

    fn bounding_box_where(&self, occupied: impl Fn(f32) -> bool) -> Option<BoundingBox> {
        let mut bounds: Option<BoundingBox> = None;
        for (x, y, v) in self.pixels() {
            if !occupied(v) {
                continue;
            }
            bounds = Some(match bounds {
                None => BoundingBox {
                    x_min: x,
                    y_min: y,
                    x_max: x,
                    y_max: y,
                },
                Some(b) => BoundingBox {
                    x_min: b.x_min.min(x),
                    y_min: b.y_min.min(y),
                    x_max: b.x_max.max(x),
                    y_max: b.y_max.max(y),
                },
            });
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        !self.pixels().any(|(_, _, v)| v >= OCCUPIED)
    }

    /// True when every sample is exactly zero.
    pub fn is_blank(&self) -> bool {
        self.pixels().all(|(_, _, v)| v == 0.0)
    }

    /// Number of occupied pixels.
    pub fn area(&self) -> usize {
        self.pixels().filter(|&(_, _, v)| v >= OCCUPIED).count()
    }

    /// Bounding box midpoint; `None` for an empty region.
    pub fn center(&self) -> Option<(u32, u32)> {
        self.bounding_box().map(|b| b.center())
    }

    /// Ones where the value reaches `cut`, zeros elsewhere.
    pub fn binarize(&self, cut: f32) -> Self {
        self.map(|v| if v >= cut { 1.0 } else { 0.0 })
    }

    pub fn invert(&self) -> Self {
        self.map(|v| 1.0 - v)
    }

    pub fn fill_rect(&mut self, rect: BoundingBox, value: f32) {
        if self.width() == 0 || self.height() == 0 {
            return;
        }
        let x_max = rect.x_max.min(self.width().saturating_sub(1));
        let y_max = rect.y_max.min(self.height().saturating_sub(1));
        for y in rect.y_min..=y_max {
            for x in rect.x_min..=x_max {
                self.set(x, y, value);
            }
        }
    }

    pub fn same_shape(&self, other: &Region) -> bool {
        self.dimensions() == other.dimensions()
    }

    pub fn ensure_same_shape(&self, other: &Region) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            let (w, h) = self.dimensions();
            let (ow, oh) = other.dimensions();
            Err(MaskError::invalid(format!(
                "mask sizes differ: {w}x{h} vs {ow}x{oh}"
            )))
        }
    }
}

impl From<&GrayImage> for Region {
    fn from(image: &GrayImage) -> Self {
        Self::from_gray(image)
    }
}
