//! Volume texture parameters: voxel data plus its geometry.

use std::sync::Arc;

use glam::Vec3;
use half::f16;

use crate::backend::types::*;
use crate::error::{GraphicsError, GraphicsResult};

/// Four half floats, the texel of a gradient volume.
pub type Half4 = [f16; 4];

/// Voxel data of a 3D texture.
///
/// `data` holds `width * height * depth` texels of `format`, x fastest. The
/// length is not checked on construction; [`is_consistent`](Self::is_consistent)
/// tells whether it matches, and texture creation rejects data that doesn't.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTextureParams<T> {
    pub data: Option<Arc<[T]>>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: TextureFormat,
}

/// Byte-encoded volume, e.g. densities read from a raw file.
pub type VolumeTextureByteParams = VolumeTextureParams<u8>;

/// Gradient volume: direction in xyz and magnitude in w.
pub type VolumeTextureGradientParams = VolumeTextureParams<Half4>;

impl<T: bytemuck::Pod> VolumeTextureParams<T> {
    pub fn new(
        data: impl Into<Arc<[T]>>,
        width: u32,
        height: u32,
        depth: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            data: Some(data.into()),
            width,
            height,
            depth,
            format,
        }
    }

    /// Geometry without voxel data. Realizes to no texture.
    pub fn empty(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            data: None,
            width,
            height,
            depth,
            format,
        }
    }

    pub fn extent(&self) -> Extent3d {
        Extent3d::new(self.width, self.height, self.depth)
    }

    pub fn voxel_count(&self) -> u64 {
        self.extent().texel_count()
    }

    /// Byte length the data must have.
    pub fn expected_len(&self) -> usize {
        self.voxel_count() as usize * self.format.bytes_per_pixel() as usize
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.data.as_deref().map(bytemuck::cast_slice)
    }

    /// Whether data is present and its length matches the geometry.
    pub fn is_consistent(&self) -> bool {
        self.format.is_known() && self.as_bytes().map(<[u8]>::len) == Some(self.expected_len())
    }

    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor::new_3d(self.width, self.height, self.depth, self.format)
    }

    /// Texel index of a voxel, x fastest.
    pub fn voxel_index(&self, x: u32, y: u32, z: u32) -> usize {
        let (width, height) = (self.width as usize, self.height as usize);
        (z as usize * height + y as usize) * width + x as usize
    }
}

impl VolumeTextureGradientParams {
    /// Gradient volume; the format is always [`TextureFormat::Rgba16Float`].
    pub fn gradient(data: impl Into<Arc<[Half4]>>, width: u32, height: u32, depth: u32) -> Self {
        Self::new(data, width, height, depth, TextureFormat::Rgba16Float)
    }
}

impl VolumeTextureByteParams {
    /// Density at a voxel, normalized to `0..=1` for unorm formats.
    fn density(&self, bytes: &[u8], x: u32, y: u32, z: u32) -> f32 {
        let index = self.voxel_index(x, y, z);
        match self.format {
            TextureFormat::R8Unorm => bytes[index] as f32 / 255.0,
            TextureFormat::R16Unorm => {
                let at = index * 2;
                u16::from_le_bytes([bytes[at], bytes[at + 1]]) as f32 / 65535.0
            }
            TextureFormat::R32Float => {
                let at = index * 4;
                f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            }
            _ => 0.0,
        }
    }

    /// Central-difference gradients of a single-channel density volume.
    ///
    /// Border voxels use one-sided differences. Each texel holds the
    /// normalized gradient direction in xyz and its magnitude in w.
    pub fn compute_gradients(&self) -> GraphicsResult<VolumeTextureGradientParams> {
        if !matches!(
            self.format,
            TextureFormat::R8Unorm | TextureFormat::R16Unorm | TextureFormat::R32Float
        ) {
            return Err(GraphicsError::InvalidParameter(format!(
                "cannot compute gradients of {:?} voxels",
                self.format
            )));
        }
        if !self.is_consistent() {
            return Err(GraphicsError::InvalidParameter(format!(
                "volume data does not match {}x{}x{} {:?}",
                self.width, self.height, self.depth, self.format
            )));
        }
        let bytes = self.as_bytes().unwrap_or_default();
        let (w, h, d) = (self.width, self.height, self.depth);

        let mut out = Vec::with_capacity(self.voxel_count() as usize);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let diff = |lo: (u32, u32, u32), hi: (u32, u32, u32), span: u32| {
                        if span == 0 {
                            return 0.0;
                        }
                        let high = self.density(bytes, hi.0, hi.1, hi.2);
                        let low = self.density(bytes, lo.0, lo.1, lo.2);
                        (high - low) / span as f32
                    };
                    let (x0, x1) = (x.saturating_sub(1), (x + 1).min(w - 1));
                    let (y0, y1) = (y.saturating_sub(1), (y + 1).min(h - 1));
                    let (z0, z1) = (z.saturating_sub(1), (z + 1).min(d - 1));
                    let gradient = Vec3::new(
                        diff((x0, y, z), (x1, y, z), x1 - x0),
                        diff((x, y0, z), (x, y1, z), y1 - y0),
                        diff((x, y, z0), (x, y, z1), z1 - z0),
                    );
                    let magnitude = gradient.length();
                    let direction = gradient.normalize_or_zero();
                    out.push([
                        f16::from_f32(direction.x),
                        f16::from_f32(direction.y),
                        f16::from_f32(direction.z),
                        f16::from_f32(magnitude),
                    ]);
                }
            }
        }

        log::debug!("Computed {}x{}x{} gradient volume", w, h, d);
        Ok(VolumeTextureGradientParams::gradient(out, w, h, d))
    }
}
