use std::path::Path;

use crate::{error::Result, region::Region};

impl Region {
    /// Decode an encoded image (PNG, ...) into a mask via its luma channel
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_gray(&img.to_luma8()))
    }

    /// Encode the mask as an 8-bit PNG
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_gray()
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Load a mask from an image file; color images are reduced to luma
pub fn load_mask(path: impl AsRef<Path>) -> Result<Region> {
    let path = path.as_ref();
    let img = image::open(path)?;
    let region = Region::from_gray(&img.to_luma8());
    tracing::debug!(path = %path.display(), width = region.width(), height = region.height(), "loaded mask");
    Ok(region)
}

/// Save a mask as an 8-bit grayscale image; the format follows the extension
pub fn save_mask(region: &Region, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    region.to_gray().save(path)?;
    tracing::debug!(path = %path.display(), "saved mask");
    Ok(())
}
