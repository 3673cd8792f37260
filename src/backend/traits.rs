//! Core backend abstraction traits
//!
//! These traits define the interface that both the wgpu and the dummy backends implement.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create texture view: {0}")]
    ViewCreationFailed(String),
    #[error("Texture format {0:?} is not supported by this device")]
    UnsupportedFormat(TextureFormat),
    #[error("Handle does not refer to a live resource")]
    InvalidHandle,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewHandle(pub(crate) u64);

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl TextureViewHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Any native object whose lifetime is tracked by the resource arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeHandle {
    Texture(TextureHandle),
    View(TextureViewHandle),
}

impl NativeHandle {
    pub fn as_texture(&self) -> Option<TextureHandle> {
        match self {
            NativeHandle::Texture(handle) => Some(*handle),
            NativeHandle::View(_) => None,
        }
    }

    pub fn as_view(&self) -> Option<TextureViewHandle> {
        match self {
            NativeHandle::View(handle) => Some(*handle),
            NativeHandle::Texture(_) => None,
        }
    }
}

impl From<TextureHandle> for NativeHandle {
    fn from(handle: TextureHandle) -> Self {
        NativeHandle::Texture(handle)
    }
}

impl From<TextureViewHandle> for NativeHandle {
    fn from(handle: TextureViewHandle) -> Self {
        NativeHandle::View(handle)
    }
}

/// Limits reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLimits {
    pub max_texture_dimension_1d: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_dimension_1d: 8192,
            max_texture_dimension_2d: 8192,
            max_texture_dimension_3d: 2048,
        }
    }
}

impl DeviceLimits {
    /// Check a descriptor against these limits.
    pub fn check(&self, desc: &TextureDescriptor) -> BackendResult<()> {
        let max = match desc.dimension {
            TextureDimension::D1 => self.max_texture_dimension_1d,
            TextureDimension::D2 => self.max_texture_dimension_2d,
            TextureDimension::D3 => self.max_texture_dimension_3d,
        };
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: texture dimensions cannot be zero",
                desc.label
            )));
        }
        if desc.width > max || desc.height > max || desc.depth > max {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: texture dimension exceeds maximum {max}",
                desc.label
            )));
        }
        if desc.dimension == TextureDimension::D1 && (desc.height != 1 || desc.depth != 1) {
            return Err(BackendError::TextureCreationFailed(
                "1D textures must have height and depth of 1".into(),
            ));
        }
        if !desc.format.is_known() {
            return Err(BackendError::UnsupportedFormat(desc.format));
        }
        Ok(())
    }
}

/// GPU backend trait.
///
/// All methods take `&self`: creation happens on the thread owning the device,
/// destruction may come from any thread (arena teardown).
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Limits of the underlying device.
    fn limits(&self) -> DeviceLimits;

    /// Create a texture with uninitialized contents.
    fn create_texture(&self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Upload pixel data into one mip level of a texture.
    fn write_texture(
        &self,
        texture: TextureHandle,
        mip_level: u32,
        data: &[u8],
        layout: DataLayout,
        size: Extent3d,
    ) -> BackendResult<()>;

    /// Descriptor the texture was created with, `None` once it is destroyed.
    fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor>;

    /// Create a view over a texture.
    fn create_texture_view(
        &self,
        texture: TextureHandle,
        desc: &ViewDescriptor,
    ) -> BackendResult<TextureViewHandle>;

    /// Destroy a texture
    fn destroy_texture(&self, texture: TextureHandle);

    /// Destroy a texture view
    fn destroy_texture_view(&self, view: TextureViewHandle);

    /// Number of textures and views currently alive on the device.
    fn live_resource_count(&self) -> usize;

    /// Destroy any native handle.
    fn destroy(&self, handle: NativeHandle) {
        match handle {
            NativeHandle::Texture(texture) => self.destroy_texture(texture),
            NativeHandle::View(view) => self.destroy_texture_view(view),
        }
    }
}
