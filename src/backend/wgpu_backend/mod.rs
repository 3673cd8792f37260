//! wgpu backend implementation
//!
//! Headless: no surface or swapchain, only a device and queue used for
//! texture and view allocation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::config::{DeviceParameters, PowerPreference};

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,

    // Resource storage
    textures: Mutex<HashMap<u64, (wgpu::Texture, TextureDescriptor)>>,
    texture_views: Mutex<HashMap<u64, wgpu::TextureView>>,

    next_id: AtomicU64,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> Option<wgpu::TextureFormat> {
        Some(match format {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::R16Unorm => wgpu::TextureFormat::R16Unorm,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Unknown => return None,
        })
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::STORAGE_BINDING) {
            result |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    fn convert_dimension(dimension: TextureDimension) -> wgpu::TextureDimension {
        match dimension {
            TextureDimension::D1 => wgpu::TextureDimension::D1,
            TextureDimension::D2 => wgpu::TextureDimension::D2,
            TextureDimension::D3 => wgpu::TextureDimension::D3,
        }
    }

    fn convert_view_dimension(dimension: ViewDimension) -> wgpu::TextureViewDimension {
        match dimension {
            ViewDimension::D1 => wgpu::TextureViewDimension::D1,
            ViewDimension::D2 => wgpu::TextureViewDimension::D2,
            ViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
            ViewDimension::Cube => wgpu::TextureViewDimension::Cube,
            ViewDimension::D3 => wgpu::TextureViewDimension::D3,
        }
    }

    fn convert_power_preference(preference: PowerPreference) -> wgpu::PowerPreference {
        match preference {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }

    fn convert_error(error: wgpu::Error, context: &str) -> BackendError {
        match error {
            wgpu::Error::OutOfMemory { .. } => BackendError::OutOfMemory,
            wgpu::Error::Validation { description, .. } => {
                BackendError::TextureCreationFailed(format!("{context}: {description}"))
            }
            #[allow(unreachable_patterns)]
            other => BackendError::TextureCreationFailed(format!("{context}: {other}")),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, context: &str, f: impl FnOnce() -> T) -> BackendResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(error) => Err(Self::convert_error(error, context)),
            None => Ok(value),
        }
    }
}

impl WgpuBackend {
    /// Create a headless backend, blocking on adapter and device requests.
    pub fn new(params: &DeviceParameters) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(params))
    }

    /// Async initialization
    pub async fn new_async(params: &DeviceParameters) -> BackendResult<Self> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all());

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: Self::convert_power_preference(params.power_preference),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        // R16Unorm volumes need this feature; request it whenever it exists
        let features = adapter.features() & wgpu::Features::TEXTURE_FORMAT_16BIT_NORM;
        if !features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM) {
            log::warn!("Adapter lacks TEXTURE_FORMAT_16BIT_NORM; R16Unorm volumes are unavailable");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(params.label.as_str()),
                    required_features: features,
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            features,
            textures: Mutex::new(HashMap::new()),
            texture_views: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Get reference to the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get reference to the wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Run `f` with the wgpu view behind a handle, e.g. to build a bind group.
    pub fn with_texture_view<R>(
        &self,
        view: TextureViewHandle,
        f: impl FnOnce(&wgpu::TextureView) -> R,
    ) -> Option<R> {
        self.texture_views.lock().get(&view.0).map(f)
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn limits(&self) -> DeviceLimits {
        let limits = self.device.limits();
        DeviceLimits {
            max_texture_dimension_1d: limits.max_texture_dimension_1d,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_texture_dimension_3d: limits.max_texture_dimension_3d,
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        self.limits().check(desc)?;
        let format = Self::convert_texture_format(desc.format)
            .ok_or(BackendError::UnsupportedFormat(desc.format))?;
        if desc.format == TextureFormat::R16Unorm
            && !self.features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM)
        {
            return Err(BackendError::UnsupportedFormat(desc.format));
        }

        let texture = self.scoped("create_texture", || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: desc.label.as_deref(),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: desc.depth,
                },
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: Self::convert_dimension(desc.dimension),
                format,
                usage: Self::convert_texture_usage(desc.usage),
                view_formats: &[],
            })
        })?;

        let id = self.next_id();
        self.textures.lock().insert(id, (texture, desc.clone()));
        log::trace!("WgpuBackend: created texture {id} {:?}", desc.label);

        Ok(TextureHandle(id))
    }

    fn write_texture(
        &self,
        texture: TextureHandle,
        mip_level: u32,
        data: &[u8],
        layout: DataLayout,
        size: Extent3d,
    ) -> BackendResult<()> {
        let textures = self.textures.lock();
        let (tex, _) = textures.get(&texture.0).ok_or(BackendError::InvalidHandle)?;
        self.scoped("write_texture", || {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: tex,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.bytes_per_row),
                    rows_per_image: Some(layout.rows_per_image),
                },
                wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: size.depth,
                },
            );
        })
    }

    fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.textures
            .lock()
            .get(&texture.0)
            .map(|(_, desc)| desc.clone())
    }

    fn create_texture_view(
        &self,
        texture: TextureHandle,
        desc: &ViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let format = match desc.format {
            Some(format) => Some(
                Self::convert_texture_format(format)
                    .ok_or(BackendError::UnsupportedFormat(format))?,
            ),
            None => None,
        };

        let view = {
            let textures = self.textures.lock();
            let (tex, _) = textures
                .get(&texture.0)
                .ok_or_else(|| BackendError::ViewCreationFailed("Texture not found".into()))?;
            self.scoped("create_texture_view", || {
                tex.create_view(&wgpu::TextureViewDescriptor {
                    label: desc.label.as_deref(),
                    format,
                    dimension: desc.dimension.map(Self::convert_view_dimension),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: desc.base_mip_level,
                    mip_level_count: desc.mip_level_count,
                    base_array_layer: desc.base_array_layer,
                    array_layer_count: desc.array_layer_count,
                })
            })
            .map_err(|e| match e {
                BackendError::TextureCreationFailed(msg) => BackendError::ViewCreationFailed(msg),
                other => other,
            })?
        };

        let id = self.next_id();
        self.texture_views.lock().insert(id, view);

        Ok(TextureViewHandle(id))
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        if let Some((tex, _)) = self.textures.lock().remove(&texture.0) {
            tex.destroy();
            log::trace!("WgpuBackend: destroyed texture {}", texture.0);
        }
    }

    fn destroy_texture_view(&self, view: TextureViewHandle) {
        self.texture_views.lock().remove(&view.0);
    }

    fn live_resource_count(&self) -> usize {
        self.textures.lock().len() + self.texture_views.lock().len()
    }
}
