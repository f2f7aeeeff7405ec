//! Image decoding seam
//!
//! The texture repository decodes through [`ImageDecoder`] so the decode
//! step can be counted or replaced in tests. Decoded pixels are always
//! normalized to RGBA8 and only live until the upload finishes.

use std::path::Path;

use image::{imageops::FilterType, RgbaImage};

use crate::gfx::error::TextureError;

/// A decoded image in RGBA8 layout.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Downscales so neither side exceeds `max_dimension`, keeping the
    /// aspect ratio. Images already within the limit are returned as is.
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let largest = self.width().max(self.height());
        if largest <= max_dimension || max_dimension == 0 {
            return self;
        }

        let scale = |side: u32| ((side as u64 * max_dimension as u64) / largest as u64).max(1) as u32;
        let (width, height) = (scale(self.width()), scale(self.height()));
        Self::new(image::imageops::resize(&self.pixels, width, height, FilterType::Triangle))
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        self.width().max(self.height()).max(1).ilog2() + 1
    }

    /// Levels 1.. of the mip chain, each half the size of the previous one.
    pub fn mip_chain(&self) -> Vec<RgbaImage> {
        let mut levels = Vec::new();
        let (mut width, mut height) = (self.width(), self.height());

        for _ in 1..self.mip_level_count() {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let source = levels.last().unwrap_or(&self.pixels);
            let level = image::imageops::resize(source, width, height, FilterType::Triangle);
            levels.push(level);
        }

        levels
    }
}

/// Turns an image file into RGBA8 pixels.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, TextureError>;
}

/// Decodes PNG and JPEG files with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageDecoder;

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        let image = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(DecodedImage::new(image.to_rgba8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_halves_down_to_one_pixel() {
        let image = DecodedImage::new(RgbaImage::new(8, 2));
        assert_eq!(image.mip_level_count(), 4);

        let sizes: Vec<_> = image
            .mip_chain()
            .iter()
            .map(|level| level.dimensions())
            .collect();
        assert_eq!(sizes, vec![(4, 1), (2, 1), (1, 1)]);
    }

    #[test]
    fn oversized_image_is_scaled_to_the_limit() {
        let image = DecodedImage::new(RgbaImage::new(64, 16)).fit_within(16);
        assert_eq!((image.width(), image.height()), (16, 4));

        let tall = DecodedImage::new(RgbaImage::new(3, 300)).fit_within(100);
        assert_eq!((tall.width(), tall.height()), (1, 100));

        let small = DecodedImage::new(RgbaImage::new(8, 8)).fit_within(16);
        assert_eq!((small.width(), small.height()), (8, 8));
    }

    #[test]
    fn single_pixel_has_no_extra_levels() {
        let image = DecodedImage::new(RgbaImage::new(1, 1));
        assert_eq!(image.mip_level_count(), 1);
        assert!(image.mip_chain().is_empty());
    }

    #[test]
    fn grey_png_is_expanded_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grey.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([200])).save(&path).unwrap();

        let decoded = FileImageDecoder.decode(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(decoded.pixels().get_pixel(0, 0).0, [200, 200, 200, 255]);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = FileImageDecoder.decode(&path).unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
    }
}
