//! Texture loading and data structures.
//! Images are decoded to RGBA8 and flipped so that row 0 is the bottom row,
//! matching texture coordinates authored with a bottom-left origin.

use std::path::Path;

use anyhow::{Context, anyhow};
use image::{RgbaImage, imageops};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

/// Number of levels in a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

impl TextureData {
    /// Create a new texture with given dimensions and RGBA8 format.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }

    /// Load an image file of any enabled format, flipped bottom-to-top.
    pub fn load_flipped<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path)
            .with_context(|| format!("Failed to open image {:?}", path))?;

        let mut rgba = img.to_rgba8();
        imageops::flip_vertical_in_place(&mut rgba);
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Ok(Self::new_rgba8(width, height, data))
    }

    /// Build the full mip chain, level 0 first. Each level halves the
    /// previous one (never below 1 pixel).
    pub fn mip_chain(&self) -> anyhow::Result<Vec<TextureData>> {
        let base = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("Texture data does not match {}x{}", self.width, self.height))?;

        let levels = mip_level_count(self.width, self.height);
        let mut chain = Vec::with_capacity(levels as usize);
        chain.push(self.clone());
        for level in 1..levels {
            let width = (self.width >> level).max(1);
            let height = (self.height >> level).max(1);
            let scaled = imageops::resize(&base, width, height, imageops::FilterType::Triangle);
            chain.push(Self::new_rgba8(width, height, scaled.into_raw()));
        }
        log::debug!(
            "Generated {} mip levels for {}x{} texture",
            chain.len(),
            self.width,
            self.height
        );
        Ok(chain)
    }

    /// Create a simple test texture (checkerboard pattern).
    pub fn create_test_texture(size: u32) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let checker = ((x / 8) + (y / 8)) % 2;
                if checker == 0 {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&[128, 128, 128, 255]);
                }
            }
        }

        Self::new_rgba8(size, size, data)
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Bytes in one row of pixels.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_pixel()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const TOP: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BOTTOM: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// 3x2 image: red top row, blue bottom row.
    fn two_band_image() -> RgbaImage {
        RgbaImage::from_fn(3, 2, |_, y| if y == 0 { TOP } else { BOTTOM })
    }

    fn assert_bottom_row_first(tex: &TextureData) {
        assert_eq!(tex.width, 3);
        assert_eq!(tex.height, 2);
        assert_eq!(tex.data.len(), 3 * 2 * 4);
        let row = tex.bytes_per_row() as usize;
        assert_eq!(&tex.data[0..4], &BOTTOM.0);
        assert_eq!(&tex.data[row..row + 4], &TOP.0);
    }

    #[test]
    fn png_is_flipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bands.png");
        two_band_image().save(&path).unwrap();

        let tex = TextureData::load_flipped(&path).unwrap();
        assert!(tex.is_valid());
        assert_bottom_row_first(&tex);
    }

    #[test]
    fn bmp_is_flipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bands.bmp");
        two_band_image().save(&path).unwrap();

        let tex = TextureData::load_flipped(&path).unwrap();
        assert_bottom_row_first(&tex);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = TextureData::load_flipped("/nonexistent/walls.bmp").unwrap_err();
        assert!(err.to_string().contains("walls.bmp"));
    }

    #[test]
    fn mip_level_counts() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 20), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn mip_chain_halves_down_to_one_pixel() {
        let tex = TextureData::create_test_texture(16);
        let chain = tex.mip_chain().unwrap();
        let sizes: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(16, 16), (8, 8), (4, 4), (2, 2), (1, 1)]);
        assert!(chain.iter().all(TextureData::is_valid));
        assert_eq!(chain[0].data, tex.data);
    }

    #[test]
    fn mip_chain_of_non_square_texture() {
        let tex = TextureData::new_rgba8(4, 1, vec![200; 16]);
        let chain = tex.mip_chain().unwrap();
        let sizes: Vec<_> = chain.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(4, 1), (2, 1), (1, 1)]);
    }
}
