//! DDS container reader and writer for uncompressed textures.
//!
//! Handles 2D textures and volumes described either by a DX10 extension
//! header or by a legacy pixel format. Block-compressed 2D files are left to
//! the `image` crate; cube maps and texture arrays are rejected.

use crate::backend::types::*;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::texture::{full_mip_count, TextureImage};

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: usize = 124;
const DX10_HEADER_SIZE: usize = 20;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;
const DDSD_DEPTH: u32 = 0x80_0000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_ALPHA: u32 = 0x2;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

// Largest extents Direct3D 11 allows for each texture kind
const MAX_DIMENSION_2D: u32 = 16384;
const MAX_DIMENSION_3D: u32 = 2048;

const RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;
const RESOURCE_DIMENSION_TEXTURE3D: u32 = 4;
const RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;

// D3DFMT codes stored directly in the FourCC field
const D3DFMT_A16B16G16R16F: u32 = 113;
const D3DFMT_R32F: u32 = 114;
const D3DFMT_A32B32G32R32F: u32 = 116;

fn dxgi_to_format(dxgi: u32) -> Option<TextureFormat> {
    Some(match dxgi {
        2 => TextureFormat::Rgba32Float,
        10 => TextureFormat::Rgba16Float,
        28 => TextureFormat::Rgba8Unorm,
        29 => TextureFormat::Rgba8UnormSrgb,
        41 => TextureFormat::R32Float,
        56 => TextureFormat::R16Unorm,
        61 => TextureFormat::R8Unorm,
        87 => TextureFormat::Bgra8Unorm,
        _ => return None,
    })
}

fn format_to_dxgi(format: TextureFormat) -> Option<u32> {
    Some(match format {
        TextureFormat::Rgba32Float => 2,
        TextureFormat::Rgba16Float => 10,
        TextureFormat::Rgba8Unorm => 28,
        TextureFormat::Rgba8UnormSrgb => 29,
        TextureFormat::R32Float => 41,
        TextureFormat::R16Unorm => 56,
        TextureFormat::R8Unorm => 61,
        TextureFormat::Bgra8Unorm => 87,
        _ => return None,
    })
}

fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

fn read_u32(bytes: &[u8], offset: usize) -> GraphicsResult<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| GraphicsError::InvalidContainer("DDS header truncated".into()))
}

/// Whether `bytes` start with the DDS magic.
pub fn is_dds(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

struct PixelFormat {
    flags: u32,
    fourcc: u32,
    bit_count: u32,
    masks: [u32; 4],
}

impl PixelFormat {
    fn legacy_format(&self) -> Option<TextureFormat> {
        let [r, g, b, a] = self.masks;
        if self.flags & DDPF_FOURCC != 0 {
            return match self.fourcc {
                D3DFMT_A16B16G16R16F => Some(TextureFormat::Rgba16Float),
                D3DFMT_R32F => Some(TextureFormat::R32Float),
                D3DFMT_A32B32G32R32F => Some(TextureFormat::Rgba32Float),
                _ => None,
            };
        }
        if self.flags & DDPF_LUMINANCE != 0 {
            return match (self.bit_count, r) {
                (8, 0xff) => Some(TextureFormat::R8Unorm),
                (16, 0xffff) => Some(TextureFormat::R16Unorm),
                _ => None,
            };
        }
        if self.flags & DDPF_ALPHA != 0 && self.bit_count == 8 {
            return Some(TextureFormat::R8Unorm);
        }
        if self.flags & DDPF_RGB != 0 && self.bit_count == 32 {
            let alpha = if self.flags & DDPF_ALPHAPIXELS != 0 { a } else { 0xff00_0000 };
            return match (r, g, b, alpha) {
                (0xff, 0xff00, 0xff_0000, 0xff00_0000) => Some(TextureFormat::Rgba8Unorm),
                (0xff_0000, 0xff00, 0xff, 0xff00_0000) => Some(TextureFormat::Bgra8Unorm),
                _ => None,
            };
        }
        None
    }

    fn is_block_compressed(&self) -> bool {
        self.flags & DDPF_FOURCC != 0
            && [b"DXT1", b"DXT2", b"DXT3", b"DXT4", b"DXT5", b"ATI1", b"ATI2", b"BC4U", b"BC5U"]
                .iter()
                .any(|code| fourcc(code) == self.fourcc)
    }
}

/// Decode an uncompressed DDS file.
///
/// Returns `Ok(None)` for block-compressed 2D files, which the caller should
/// hand to a general image decoder.
pub fn decode(bytes: &[u8]) -> GraphicsResult<Option<TextureImage>> {
    if !is_dds(bytes) {
        return Err(GraphicsError::InvalidContainer("missing DDS magic".into()));
    }
    let header = &bytes[MAGIC.len()..];
    if read_u32(header, 0)? as usize != HEADER_SIZE {
        return Err(GraphicsError::InvalidContainer("bad DDS header size".into()));
    }

    let flags = read_u32(header, 4)?;
    let height = read_u32(header, 8)?;
    let width = read_u32(header, 12)?;
    let depth_field = read_u32(header, 20)?;
    let mip_field = read_u32(header, 24)?;
    let pixel_format = PixelFormat {
        flags: read_u32(header, 76)?,
        fourcc: read_u32(header, 80)?,
        bit_count: read_u32(header, 84)?,
        masks: [
            read_u32(header, 88)?,
            read_u32(header, 92)?,
            read_u32(header, 96)?,
            read_u32(header, 100)?,
        ],
    };
    let caps2 = read_u32(header, 108)?;

    if caps2 & DDSCAPS2_CUBEMAP != 0 {
        return Err(GraphicsError::InvalidContainer("cube maps are not supported".into()));
    }

    let mut volume = caps2 & DDSCAPS2_VOLUME != 0 && flags & DDSD_DEPTH != 0;
    let mut data_offset = MAGIC.len() + HEADER_SIZE;

    let format = if pixel_format.flags & DDPF_FOURCC != 0 && pixel_format.fourcc == fourcc(b"DX10")
    {
        let ext = bytes.get(data_offset..).unwrap_or_default();
        let dxgi = read_u32(ext, 0)?;
        let dimension = read_u32(ext, 4)?;
        let misc = read_u32(ext, 8)?;
        let array_size = read_u32(ext, 12)?;
        data_offset += DX10_HEADER_SIZE;

        if misc & RESOURCE_MISC_TEXTURECUBE != 0 || array_size > 1 {
            return Err(GraphicsError::InvalidContainer(
                "texture arrays and cube maps are not supported".into(),
            ));
        }
        match dimension {
            RESOURCE_DIMENSION_TEXTURE2D => volume = false,
            RESOURCE_DIMENSION_TEXTURE3D => volume = true,
            other => {
                return Err(GraphicsError::InvalidContainer(format!(
                    "unsupported DX10 resource dimension {other}"
                )))
            }
        }
        dxgi_to_format(dxgi).ok_or_else(|| {
            GraphicsError::InvalidContainer(format!("unsupported DXGI format {dxgi}"))
        })?
    } else if pixel_format.is_block_compressed() {
        if volume {
            return Err(GraphicsError::InvalidContainer(
                "block-compressed volumes are not supported".into(),
            ));
        }
        return Ok(None);
    } else {
        pixel_format.legacy_format().ok_or_else(|| {
            GraphicsError::InvalidContainer("unsupported DDS pixel format".into())
        })?
    };

    let depth = if volume { depth_field.max(1) } else { 1 };
    let mip_levels = if flags & DDSD_MIPMAPCOUNT != 0 { mip_field.max(1) } else { 1 };
    let dimension = if volume { TextureDimension::D3 } else { TextureDimension::D2 };

    let max = if volume { MAX_DIMENSION_3D } else { MAX_DIMENSION_2D };
    if width == 0 || height == 0 || width > max || height > max || depth > max {
        return Err(GraphicsError::InvalidContainer(format!(
            "DDS extent {width}x{height}x{depth} outside 1..={max}"
        )));
    }
    let full_chain = full_mip_count(width, height, if volume { depth } else { 1 });
    if mip_levels > full_chain {
        return Err(GraphicsError::InvalidContainer(format!(
            "DDS declares {mip_levels} mips, at most {full_chain} fit {width}x{height}x{depth}"
        )));
    }

    let desc = TextureDescriptor {
        label: None,
        width,
        height,
        depth,
        mip_levels,
        dimension,
        format,
        usage: TextureUsage::SAMPLED,
    };
    let len = desc.total_byte_size();
    let data = bytes
        .get(data_offset..data_offset.saturating_add(len))
        .ok_or_else(|| {
            GraphicsError::InvalidContainer(format!(
                "DDS payload truncated: need {len} bytes, have {}",
                bytes.len().saturating_sub(data_offset)
            ))
        })?
        .to_vec();

    log::trace!("DDS: {width}x{height}x{depth} {format:?}, {mip_levels} mips");
    Ok(Some(TextureImage {
        name: String::new(),
        width,
        height,
        depth,
        dimension,
        format,
        mip_levels,
        data,
    }))
}

/// Encode an image as a DX10 DDS file.
pub fn encode(image: &TextureImage) -> GraphicsResult<Vec<u8>> {
    let dxgi = format_to_dxgi(image.format)
        .ok_or(crate::backend::BackendError::UnsupportedFormat(image.format))?;
    let desc = image.descriptor();
    let len = desc.total_byte_size();
    if image.data.len() != len {
        return Err(GraphicsError::InvalidParameter(format!(
            "{}: expected {len} bytes of pixel data, got {}",
            image.name,
            image.data.len()
        )));
    }
    let volume = image.dimension == TextureDimension::D3;

    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PITCH | DDSD_PIXELFORMAT;
    let mut caps = DDSCAPS_TEXTURE;
    let mut caps2 = 0;
    if desc.mip_levels > 1 {
        flags |= DDSD_MIPMAPCOUNT;
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if volume {
        flags |= DDSD_DEPTH;
        caps |= DDSCAPS_COMPLEX;
        caps2 |= DDSCAPS2_VOLUME;
    }

    let mut header = [0u32; HEADER_SIZE / 4];
    header[0] = HEADER_SIZE as u32;
    header[1] = flags;
    header[2] = image.height;
    header[3] = image.width;
    header[4] = image.width * image.format.bytes_per_pixel();
    header[5] = if volume { image.depth } else { 0 };
    header[6] = desc.mip_levels;
    // pixel format block starts at byte 72
    header[18] = 32;
    header[19] = DDPF_FOURCC;
    header[20] = fourcc(b"DX10");
    header[26] = caps;
    header[27] = caps2;

    let dimension = if volume {
        RESOURCE_DIMENSION_TEXTURE3D
    } else {
        RESOURCE_DIMENSION_TEXTURE2D
    };
    let ext = [dxgi, dimension, 0, 1, 0];

    let mut out = Vec::with_capacity(MAGIC.len() + HEADER_SIZE + DX10_HEADER_SIZE + len);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(bytemuck::cast_slice(&header.map(u32::to_le)[..]));
    out.extend_from_slice(bytemuck::cast_slice(&ext.map(u32::to_le)[..]));
    out.extend_from_slice(&image.data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(width: u32, height: u32, depth: u32, format: TextureFormat) -> TextureImage {
        let len = (width * height * depth * format.bytes_per_pixel()) as usize;
        TextureImage {
            name: "volume".into(),
            width,
            height,
            depth,
            dimension: TextureDimension::D3,
            format,
            mip_levels: 1,
            data: (0..len).map(|i| i as u8).collect(),
        }
    }

    fn legacy_header(width: u32, height: u32, depth: u32, pf: [u32; 8], caps2: u32) -> Vec<u8> {
        let mut header = [0u32; HEADER_SIZE / 4];
        header[0] = HEADER_SIZE as u32;
        header[1] = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_DEPTH;
        header[2] = height;
        header[3] = width;
        header[5] = depth;
        header[18..26].copy_from_slice(&pf);
        header[27] = caps2;
        let mut out = MAGIC.to_vec();
        for word in header {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_volume_roundtrip() {
        let image = volume(4, 4, 4, TextureFormat::R8Unorm);
        let bytes = encode(&image).unwrap();
        let decoded = decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded.dimension, TextureDimension::D3);
        assert_eq!((decoded.width, decoded.height, decoded.depth), (4, 4, 4));
        assert_eq!(decoded.format, TextureFormat::R8Unorm);
        assert_eq!(decoded.data, image.data);
    }

    #[test]
    fn test_legacy_luminance_volume() {
        let pf = [32, DDPF_LUMINANCE, 0, 16, 0xffff, 0, 0, 0];
        let mut bytes = legacy_header(2, 2, 2, pf, DDSCAPS2_VOLUME);
        bytes.extend_from_slice(&[0u8; 16]);
        let decoded = decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded.format, TextureFormat::R16Unorm);
        assert_eq!(decoded.depth, 2);
    }

    #[test]
    fn test_legacy_bgra() {
        let pf = [
            32,
            DDPF_RGB | DDPF_ALPHAPIXELS,
            0,
            32,
            0xff_0000,
            0xff00,
            0xff,
            0xff00_0000,
        ];
        let mut bytes = legacy_header(1, 1, 0, pf, 0);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let decoded = decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded.format, TextureFormat::Bgra8Unorm);
        assert_eq!(decoded.dimension, TextureDimension::D2);
    }

    #[test]
    fn test_compressed_2d_is_deferred() {
        let pf = [32, DDPF_FOURCC, fourcc(b"DXT1"), 0, 0, 0, 0, 0];
        let bytes = legacy_header(4, 4, 0, pf, 0);
        assert!(decode(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_truncated_payload() {
        let image = volume(2, 2, 2, TextureFormat::R32Float);
        let mut bytes = encode(&image).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            decode(&bytes),
            Err(GraphicsError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_oversized_extent_rejected() {
        let mut bytes = encode(&volume(2, 2, 2, TextureFormat::R8Unorm)).unwrap();
        for word in [2usize, 3, 5] {
            let at = MAGIC.len() + word * 4;
            bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        }
        assert!(matches!(
            decode(&bytes),
            Err(GraphicsError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let pf = [32, DDPF_RGB, 0, 32, 0xff, 0xff00, 0xff_0000, 0];
        let bytes = legacy_header(0, 4, 0, pf, 0);
        assert!(matches!(
            decode(&bytes),
            Err(GraphicsError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_excess_mip_count_rejected() {
        let mut bytes = encode(&volume(2, 2, 2, TextureFormat::R8Unorm)).unwrap();
        let flags_at = MAGIC.len() + 4;
        let flags = read_u32(&bytes[MAGIC.len()..], 4).unwrap() | DDSD_MIPMAPCOUNT;
        bytes[flags_at..flags_at + 4].copy_from_slice(&flags.to_le_bytes());
        let mips_at = MAGIC.len() + 24;
        bytes[mips_at..mips_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(GraphicsError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_cubemap_rejected() {
        let pf = [32, DDPF_RGB, 0, 32, 0xff, 0xff00, 0xff_0000, 0];
        let bytes = legacy_header(1, 1, 0, pf, DDSCAPS2_CUBEMAP);
        assert!(decode(&bytes).is_err());
    }
}
