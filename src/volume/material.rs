//! Volume materials: voxel data source plus ray-marching parameters.

use std::path::Path;
use std::sync::Arc;

use glam::Vec4;

use crate::backend::types::{SamplerDescriptor, TextureFormat};
use crate::device::GraphicsDevice;
use crate::error::GraphicsResult;
use crate::resources::ResourceViewProxy;
use crate::volume::params::{VolumeTextureByteParams, VolumeTextureGradientParams};
use crate::volume::raw::load_raw_file;

/// Pass used to ray-march density volumes.
pub const DEFAULT_PASS: &str = "Default";
/// Pass used to shade gradient volumes.
pub const DIFFUSE_PASS: &str = "Diffuse";

/// Where a volume material gets its voxels from.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeDataSource {
    /// An encoded texture container, typically a volume DDS file.
    Stream(Arc<[u8]>),
    /// Single-channel density voxels.
    Raw(VolumeTextureByteParams),
    /// Gradient voxels, always [`TextureFormat::Rgba16Float`].
    Gradient(VolumeTextureGradientParams),
}

impl VolumeDataSource {
    /// Name of the render pass drawing this kind of volume.
    pub fn pass_name(&self) -> &'static str {
        match self {
            VolumeDataSource::Stream(_) | VolumeDataSource::Raw(_) => DEFAULT_PASS,
            VolumeDataSource::Gradient(_) => DIFFUSE_PASS,
        }
    }
}

/// Create the shader view for a data source.
///
/// Streams are decoded through the device's texture cache, so materials
/// loading the same bytes share one texture. Parameters without data yield
/// `None`, which renderers treat as nothing to draw.
pub fn create_volume_view(
    device: &Arc<GraphicsDevice>,
    source: &VolumeDataSource,
) -> GraphicsResult<Option<ResourceViewProxy>> {
    let proxy = match source {
        VolumeDataSource::Stream(bytes) => {
            device.texture_cache().get_or_create(device, bytes, false)?
        }
        VolumeDataSource::Raw(params) => {
            let mut proxy = ResourceViewProxy::new(Some(Arc::clone(device)));
            proxy.create_from_volume(params)?;
            proxy
        }
        VolumeDataSource::Gradient(params) => {
            let mut proxy = ResourceViewProxy::new(Some(Arc::clone(device)));
            if let Some(data) = params.data.as_deref() {
                proxy.create_from_3d_array(
                    data,
                    params.width,
                    params.height,
                    params.depth,
                    TextureFormat::Rgba16Float,
                    true,
                )?;
            }
            proxy
        }
    };
    Ok(proxy.shader_resource_view().is_some().then_some(proxy))
}

/// Lifecycle of a [`VolumeMaterial`]'s GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialState {
    /// Nothing created yet.
    Uninitialized,
    /// Views are up to date.
    Realized,
    /// A property changed since the views were created.
    Stale,
    /// Released for good.
    Disposed,
}

/// Uniform block of the volume ray-marching shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeUniforms {
    pub color: Vec4,
    pub sample_distance: f32,
    pub max_iterations: u32,
    pub iteration_offset: u32,
    pub iso_value: f32,
    pub has_transfer_map: u32,
    pub _padding: [u32; 3],
}

/// A volume material.
///
/// Views are created lazily by [`realize`](Self::realize). Changing any
/// property makes realized views stale; the next `realize` rebuilds them.
pub struct VolumeMaterial {
    source: Option<VolumeDataSource>,
    sampler: SamplerDescriptor,
    sample_distance: f32,
    max_iterations: u32,
    iteration_offset: u32,
    iso_value: f32,
    color: Vec4,
    transfer_map: Vec<Vec4>,
    state: MaterialState,
    device: Option<Arc<GraphicsDevice>>,
    volume_view: Option<ResourceViewProxy>,
    transfer_map_view: Option<ResourceViewProxy>,
}

impl Default for VolumeMaterial {
    fn default() -> Self {
        Self {
            source: None,
            sampler: SamplerDescriptor::volume(),
            sample_distance: 1.0,
            max_iterations: i32::MAX as u32,
            iteration_offset: 0,
            iso_value: 0.0,
            color: Vec4::ONE,
            transfer_map: Vec::new(),
            state: MaterialState::Uninitialized,
            device: None,
            volume_view: None,
            transfer_map_view: None,
        }
    }
}

macro_rules! setter {
    ($(#[$meta:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$meta])*
        pub fn $name(&mut self, value: $ty) {
            if self.$field != value {
                self.$field = value;
                self.invalidate();
            }
        }
    };
}

impl VolumeMaterial {
    pub fn new(source: VolumeDataSource) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn from_stream(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(VolumeDataSource::Stream(bytes.into()))
    }

    pub fn from_raw(params: VolumeTextureByteParams) -> Self {
        Self::new(VolumeDataSource::Raw(params))
    }

    pub fn from_gradient(params: VolumeTextureGradientParams) -> Self {
        Self::new(VolumeDataSource::Gradient(params))
    }

    /// Material over a raw volume file.
    pub fn load_raw(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        depth: u32,
    ) -> GraphicsResult<Self> {
        let volume = load_raw_file(path, width, height, depth)?;
        Ok(Self::from_raw(volume.params))
    }

    pub fn source(&self) -> Option<&VolumeDataSource> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<VolumeDataSource>) {
        if self.source != source {
            self.source = source;
            self.invalidate();
        }
    }

    pub fn sampler(&self) -> &SamplerDescriptor {
        &self.sampler
    }

    setter!(set_sampler, sampler: SamplerDescriptor);

    pub fn sample_distance(&self) -> f32 {
        self.sample_distance
    }

    setter!(
        /// Ray step length in texture space.
        set_sample_distance, sample_distance: f32
    );

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    setter!(set_max_iterations, max_iterations: u32);

    pub fn iteration_offset(&self) -> u32 {
        self.iteration_offset
    }

    setter!(
        /// Steps skipped at the start of each ray.
        set_iteration_offset, iteration_offset: u32
    );

    pub fn iso_value(&self) -> f32 {
        self.iso_value
    }

    setter!(
        /// Densities below this value are transparent.
        set_iso_value, iso_value: f32
    );

    pub fn color(&self) -> Vec4 {
        self.color
    }

    setter!(set_color, color: Vec4);

    pub fn transfer_map(&self) -> &[Vec4] {
        &self.transfer_map
    }

    setter!(
        /// Color lookup indexed by density; empty to use [`color`](Self::color).
        set_transfer_map, transfer_map: Vec<Vec4>
    );

    pub fn state(&self) -> MaterialState {
        self.state
    }

    /// Render pass for this material's volume.
    pub fn pass_name(&self) -> &'static str {
        self.source
            .as_ref()
            .map_or(DEFAULT_PASS, VolumeDataSource::pass_name)
    }

    pub fn uniforms(&self) -> VolumeUniforms {
        VolumeUniforms {
            color: self.color,
            sample_distance: self.sample_distance,
            max_iterations: self.max_iterations,
            iteration_offset: self.iteration_offset,
            iso_value: self.iso_value,
            has_transfer_map: u32::from(!self.transfer_map.is_empty()),
            _padding: [0; 3],
        }
    }

    fn invalidate(&mut self) {
        if self.state == MaterialState::Realized {
            log::trace!("VolumeMaterial: realized views are stale");
            self.state = MaterialState::Stale;
        }
    }

    /// Create the views if they are missing or stale.
    ///
    /// Returns the volume view, or `None` when there is nothing to draw.
    pub fn realize(
        &mut self,
        device: &Arc<GraphicsDevice>,
    ) -> GraphicsResult<Option<&ResourceViewProxy>> {
        let same_device = self
            .device
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, device));
        match self.state {
            MaterialState::Disposed => {
                log::debug!("VolumeMaterial: realize after dispose, nothing to do");
                return Ok(None);
            }
            MaterialState::Realized if same_device => return Ok(self.volume_view.as_ref()),
            _ => {}
        }

        self.release_views();
        let result = self.build_views(device);
        if let Err(e) = &result {
            log::warn!("VolumeMaterial: failed to create views: {e}");
            if self.state == MaterialState::Realized {
                self.state = MaterialState::Stale;
            }
            return result.map(|()| None);
        }

        self.device = Some(Arc::clone(device));
        self.state = MaterialState::Realized;
        Ok(self.volume_view.as_ref())
    }

    fn build_views(&mut self, device: &Arc<GraphicsDevice>) -> GraphicsResult<()> {
        self.volume_view = match &self.source {
            Some(source) => create_volume_view(device, source)?,
            None => None,
        };
        if !self.transfer_map.is_empty() {
            let mut proxy = ResourceViewProxy::new(Some(Arc::clone(device)));
            proxy.create_from_1d_array(&self.transfer_map, TextureFormat::Rgba32Float, true)?;
            self.transfer_map_view = Some(proxy);
        }
        Ok(())
    }

    /// Volume view of the last `realize`, possibly stale.
    pub fn volume_view(&self) -> Option<&ResourceViewProxy> {
        self.volume_view.as_ref()
    }

    /// 1D texture of the transfer map, if one is set and realized.
    pub fn transfer_map_view(&self) -> Option<&ResourceViewProxy> {
        self.transfer_map_view.as_ref()
    }

    fn release_views(&mut self) {
        if let Some(mut view) = self.volume_view.take() {
            view.release();
        }
        if let Some(mut view) = self.transfer_map_view.take() {
            view.release();
        }
    }

    /// Release every view. The material cannot be realized again.
    pub fn dispose(&mut self) {
        self.release_views();
        self.device = None;
        self.state = MaterialState::Disposed;
    }
}

impl std::fmt::Debug for VolumeMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeMaterial")
            .field("state", &self.state)
            .field("pass", &self.pass_name())
            .field("sample_distance", &self.sample_distance)
            .field("max_iterations", &self.max_iterations)
            .field("iso_value", &self.iso_value)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<VolumeUniforms>(), 48);
