//! Decoded texture payloads.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};

use crate::backend::types::*;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::dds;

/// Pixel data ready for upload, with every mip level packed level 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Depth in texels for volumes, 1 otherwise.
    pub depth: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub mip_levels: u32,
    pub data: Vec<u8>,
}

/// Number of levels in a full mip chain for the given extent.
pub fn full_mip_count(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    u32::BITS - largest.leading_zeros()
}

impl TextureImage {
    /// Decode an image container.
    ///
    /// DDS files holding uncompressed 2D or volume data are read directly;
    /// everything else (BMP, JPEG, PNG, block-compressed DDS) goes through
    /// the `image` crate and comes out as sRGB RGBA8.
    pub fn from_bytes(bytes: &[u8], name: &str) -> GraphicsResult<Self> {
        if dds::is_dds(bytes) {
            if let Some(mut image) = dds::decode(bytes)? {
                image.name = name.to_string();
                return Ok(image);
            }
            log::debug!("{name}: block-compressed DDS, decoding through image");
        }
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(img, name))
    }

    /// Wrap a decoded image.
    pub fn from_dynamic(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            name: name.to_string(),
            width,
            height,
            depth: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            mip_levels: 1,
            data: img.to_rgba8().into_raw(),
        }
    }

    /// Checkerboard with 8 pixel cells.
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                data.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }
        Self {
            name: "checkerboard".to_string(),
            width: size,
            height: size,
            depth: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            mip_levels: 1,
            data,
        }
    }

    /// Descriptor of a sampled texture holding this image.
    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(self.name.clone()),
            width: self.width,
            height: self.height,
            depth: self.depth,
            mip_levels: self.mip_levels.max(1),
            dimension: self.dimension,
            format: self.format,
            usage: TextureUsage::SAMPLED,
        }
    }

    /// Bytes of one mip level, `None` if the level is missing or truncated.
    pub fn level_data(&self, level: u32) -> Option<&[u8]> {
        if level >= self.mip_levels.max(1) {
            return None;
        }
        let desc = self.descriptor();
        let offset: usize = (0..level).map(|l| desc.mip_level_byte_size(l)).sum();
        let len = desc.mip_level_byte_size(level);
        self.data.get(offset..offset + len)
    }

    /// Replace the mip chain with a full chain downsampled from level 0.
    ///
    /// Only 2D RGBA8 images can be downsampled; other images are left as is.
    pub fn generate_mips(&mut self) -> GraphicsResult<()> {
        let rgba8 = matches!(
            self.format,
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb
        );
        if !rgba8 || self.dimension != TextureDimension::D2 || self.depth != 1 {
            log::debug!(
                "{}: no mip generation for {:?} {:?}",
                self.name,
                self.dimension,
                self.format
            );
            return Ok(());
        }

        let level_count = full_mip_count(self.width, self.height, 1);
        let base_len = self.width as usize * self.height as usize * 4;
        let base = self.data.get(..base_len).map(<[u8]>::to_vec).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "{}: expected {base_len} bytes for level 0, got {}",
                self.name,
                self.data.len()
            ))
        })?;
        let base = RgbaImage::from_raw(self.width, self.height, base).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("{}: level 0 does not fit", self.name))
        })?;

        let mut data = base.as_raw().clone();
        for level in 1..level_count {
            let w = (self.width >> level).max(1);
            let h = (self.height >> level).max(1);
            let level_image = image::imageops::resize(&base, w, h, FilterType::Triangle);
            data.extend_from_slice(level_image.as_raw());
        }

        log::trace!("{}: generated {level_count} mip levels", self.name);
        self.data = data;
        self.mip_levels = level_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(full_mip_count(1, 1, 1), 1);
        assert_eq!(full_mip_count(16, 16, 1), 5);
        assert_eq!(full_mip_count(17, 3, 1), 5);
        assert_eq!(full_mip_count(4, 4, 8), 4);
    }

    #[test]
    fn test_generate_mips_sizes() {
        let mut image = TextureImage::checkerboard(16, [255, 0, 0, 255], [0, 0, 255, 255]);
        image.generate_mips().unwrap();
        assert_eq!(image.mip_levels, 5);
        assert_eq!(image.data.len(), (256 + 64 + 16 + 4 + 1) * 4);
        assert_eq!(image.level_data(2).map(<[u8]>::len), Some(16 * 4));
        assert_eq!(image.level_data(5), None);
    }

    #[test]
    fn test_generate_mips_skips_float_formats() {
        let mut image = TextureImage {
            name: "float".into(),
            width: 4,
            height: 4,
            depth: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::R32Float,
            mip_levels: 1,
            data: vec![0; 64],
        };
        image.generate_mips().unwrap();
        assert_eq!(image.mip_levels, 1);
    }

    #[test]
    fn test_decode_png() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageOutputFormat::Png,
            )
            .unwrap();

        let decoded = TextureImage::from_bytes(&bytes, "png").unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(&decoded.data[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            TextureImage::from_bytes(b"definitely not an image", "junk"),
            Err(GraphicsError::ImageDecode(_))
        ));
    }
}
