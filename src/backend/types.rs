//! Common types shared between backends

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    R8Unorm,
    R16Unorm,
    R32Float,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    /// Sentinel for data whose layout could not be mapped to a GPU format.
    Unknown,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TextureFormat::Unknown)
    }

    /// Size of one texel in bytes, `0` for [`TextureFormat::Unknown`].
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::R16Unorm => 2,
            TextureFormat::R32Float
            | TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Unknown => 0,
        }
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const STORAGE_BINDING: Self = Self(1 << 3);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    /// Usage of textures sampled by shaders and filled from the CPU.
    pub const SAMPLED: Self = Self((1 << 1) | (1 << 2));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// 3D extent for textures and uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    /// Depth in texels (1 for 1D and 2D textures).
    pub depth: u32,
}

impl Extent3d {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of the given mip level, clamped to 1 on every axis.
    pub fn mip_level_size(&self, level: u32, dimension: TextureDimension) -> Self {
        let shrink = |v: u32| (v >> level).max(1);
        match dimension {
            TextureDimension::D1 => Self::new(shrink(self.width), 1, 1),
            TextureDimension::D2 => Self::new(shrink(self.width), shrink(self.height), self.depth),
            TextureDimension::D3 => Self::new(
                shrink(self.width),
                shrink(self.height),
                shrink(self.depth),
            ),
        }
    }

    /// Number of texels, saturating at `u64::MAX`.
    pub fn texel_count(&self) -> u64 {
        (self.width as u64)
            .saturating_mul(self.height as u64)
            .saturating_mul(self.depth as u64)
    }
}

/// Byte layout of a pixel upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataLayout {
    /// Stride between consecutive rows in bytes.
    pub bytes_per_row: u32,
    /// Rows per 2D image; the slice pitch is `bytes_per_row * rows_per_image`.
    pub rows_per_image: u32,
}

impl DataLayout {
    /// Tightly packed layout for `extent` texels of `format`.
    pub fn packed(format: TextureFormat, extent: Extent3d) -> Self {
        Self {
            bytes_per_row: extent.width * format.bytes_per_pixel(),
            rows_per_image: extent.height,
        }
    }

    /// Minimum number of bytes an upload of `extent` needs with this layout.
    pub fn required_len(&self, format: TextureFormat, extent: Extent3d) -> usize {
        if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
            return 0;
        }
        let row = extent.width as usize * format.bytes_per_pixel() as usize;
        let slice = self.bytes_per_row as usize * self.rows_per_image as usize;
        slice * (extent.depth as usize - 1)
            + self.bytes_per_row as usize * (extent.height as usize - 1)
            + row
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLED,
        }
    }
}

impl TextureDescriptor {
    pub fn new_1d(width: u32, format: TextureFormat) -> Self {
        Self {
            width,
            dimension: TextureDimension::D1,
            format,
            ..Default::default()
        }
    }

    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            ..Default::default()
        }
    }

    pub fn new_3d(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            depth,
            dimension: TextureDimension::D3,
            format,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn size(&self) -> Extent3d {
        Extent3d::new(self.width, self.height, self.depth)
    }

    /// Tightly packed byte size of a single mip level.
    pub fn mip_level_byte_size(&self, level: u32) -> usize {
        let extent = self.size().mip_level_size(level, self.dimension);
        let bytes = extent
            .texel_count()
            .saturating_mul(self.format.bytes_per_pixel() as u64);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Tightly packed byte size of the full mip chain, saturating at `usize::MAX`.
    pub fn total_byte_size(&self) -> usize {
        let mut total = 0usize;
        for level in 0..self.mip_levels {
            total = total.saturating_add(self.mip_level_byte_size(level));
            if total == usize::MAX {
                break;
            }
        }
        total
    }
}

/// View dimensionality override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    D1,
    D2,
    D2Array,
    Cube,
    D3,
}

/// Texture view descriptor.
///
/// Passed through to the backend verbatim; `Default` lets the device infer
/// everything from the texture's own descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ViewDescriptor {
    pub label: Option<String>,
    pub format: Option<TextureFormat>,
    pub dimension: Option<ViewDimension>,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

impl ViewDescriptor {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_dimension(mut self, dimension: ViewDimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// View of a single mip level.
    pub fn single_mip(level: u32) -> Self {
        Self {
            base_mip_level: level,
            mip_level_count: Some(1),
            ..Default::default()
        }
    }
}

/// The pipeline stage a view is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ShaderResource,
    DepthStencil,
    RenderTarget,
}

/// Compare function for depth samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            compare: None,
        }
    }
}

impl SamplerDescriptor {
    /// Trilinear sampler clamped on every axis, the usual choice for volumes.
    pub fn volume() -> Self {
        Self::default()
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }
}
