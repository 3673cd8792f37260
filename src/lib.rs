//! # Volume Graphics
//!
//! Ownership of GPU textures and views, and volume texture materials built on it.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - A backend plus the arena and cache owning its textures
//! - [`ResourceArena`] - Reference-counted ownership of native handles
//! - [`ResourceViewProxy`] - One texture with its shader, depth-stencil and render-target views
//! - [`VolumeMaterial`] - Volume data source plus ray-marching parameters
//! - [`load_raw_file`] - Loader for headerless raw volume files
//! - Two backends: headless wgpu and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use volume_graphics::{DeviceParameters, GraphicsDevice, VolumeMaterial};
//!
//! let device = GraphicsDevice::new(&DeviceParameters::from_env())?;
//! let mut material = VolumeMaterial::load_raw("head.raw", 256, 256, 113)?;
//! if let Some(view) = material.realize(&device)? {
//!     // bind view.shader_resource_view() and draw with material.pass_name()
//! }
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod resources;
pub mod volume;

// Re-export main types for convenience
pub use backend::{
    BackendError, DummyBackend, GpuBackend, NativeHandle, SamplerDescriptor, TextureDescriptor,
    TextureDimension, TextureFormat, TextureHandle, TextureUsage, TextureViewHandle,
    ViewDescriptor, ViewKind,
};
pub use config::{BackendType, DeviceParameters, PowerPreference, BACKEND_ENV_VAR};
pub use device::GraphicsDevice;
pub use error::{GraphicsError, GraphicsResult};
pub use resources::{ResourceArena, ResourceToken, ResourceViewProxy, TextureCache, TextureImage};
pub use volume::{
    create_volume_view, format_for_bytes_per_voxel, load_raw_file, Half4, MaterialState,
    RawVolume, VolumeDataSource, VolumeMaterial, VolumeTextureByteParams,
    VolumeTextureGradientParams, VolumeTextureParams,
};

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library.
///
/// Only logs the version; devices are created with [`GraphicsDevice::new`].
pub fn init() {
    log::info!("Volume Graphics v{} initialized", VERSION);
}
