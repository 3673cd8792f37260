//! Loader for headerless raw volume files.
//!
//! A raw file is nothing but voxels, x fastest. The voxel size is inferred
//! from the file length and the dimensions the caller supplies.

use std::path::Path;

use crate::backend::types::TextureFormat;
use crate::error::{GraphicsError, GraphicsResult};
use crate::volume::params::VolumeTextureByteParams;

/// Format of single-channel voxels of the given size.
///
/// Sizes other than 1, 2 and 4 bytes map to [`TextureFormat::Unknown`], which
/// the caller has to check before creating a texture.
pub fn format_for_bytes_per_voxel(bytes_per_voxel: usize) -> TextureFormat {
    match bytes_per_voxel {
        1 => TextureFormat::R8Unorm,
        2 => TextureFormat::R16Unorm,
        4 => TextureFormat::R32Float,
        _ => TextureFormat::Unknown,
    }
}

/// A raw volume file read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVolume {
    pub bytes_per_voxel: usize,
    pub params: VolumeTextureByteParams,
}

impl RawVolume {
    /// Interpret `bytes` as a `width x height x depth` volume.
    pub fn from_bytes(bytes: Vec<u8>, width: u32, height: u32, depth: u32) -> GraphicsResult<Self> {
        let voxels = width as usize * height as usize * depth as usize;
        if voxels == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "raw volume dimensions {width}x{height}x{depth} are empty"
            )));
        }
        let bytes_per_voxel = bytes.len() / voxels;
        let format = format_for_bytes_per_voxel(bytes_per_voxel);
        if !format.is_known() {
            log::warn!(
                "Raw volume of {} bytes for {width}x{height}x{depth}: \
                 {bytes_per_voxel} bytes per voxel has no known format",
                bytes.len()
            );
        }
        Ok(Self {
            bytes_per_voxel,
            params: VolumeTextureByteParams::new(bytes, width, height, depth, format),
        })
    }

    pub fn format(&self) -> TextureFormat {
        self.params.format
    }

    /// Length of the voxel buffer in bytes.
    pub fn len(&self) -> usize {
        self.params.as_bytes().map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read a raw volume file. Blocks until the whole file is read.
pub fn load_raw_file(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    depth: u32,
) -> GraphicsResult<RawVolume> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    log::debug!("Read raw volume {} ({} bytes)", path.display(), bytes.len());
    RawVolume::from_bytes(bytes, width, height, depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        assert_eq!(format_for_bytes_per_voxel(1), TextureFormat::R8Unorm);
        assert_eq!(format_for_bytes_per_voxel(2), TextureFormat::R16Unorm);
        assert_eq!(format_for_bytes_per_voxel(4), TextureFormat::R32Float);
        for other in [0, 3, 5, 8, 16] {
            assert_eq!(format_for_bytes_per_voxel(other), TextureFormat::Unknown);
        }
    }

    #[test]
    fn test_from_bytes() {
        let volume = RawVolume::from_bytes(vec![0; 16], 2, 2, 2).unwrap();
        assert_eq!(volume.bytes_per_voxel, 2);
        assert_eq!(volume.format(), TextureFormat::R16Unorm);
        assert_eq!(volume.len(), 16);

        let volume = RawVolume::from_bytes(vec![0; 24], 2, 2, 2).unwrap();
        assert_eq!(volume.format(), TextureFormat::Unknown);
    }

    #[test]
    fn test_zero_dimensions() {
        assert!(matches!(
            RawVolume::from_bytes(vec![0; 8], 0, 2, 2),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_raw_file("/nonexistent/volume.raw", 2, 2, 2),
            Err(GraphicsError::Io(_))
        ));
    }
}
