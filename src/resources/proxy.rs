//! Resource-view proxy: one texture plus the views derived from it.

use std::io::Read;
use std::sync::Arc;

use crate::backend::types::*;
use crate::backend::{TextureHandle, TextureViewHandle};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::arena::ResourceToken;
use crate::resources::texture::TextureImage;
use crate::volume::VolumeTextureParams;

/// Owns at most one texture and at most one view of each [`ViewKind`].
///
/// Every creation method retires what it replaces: installing a texture
/// releases the previous texture and all of its views, installing a view
/// releases the previous view of the same kind. Handles are owned through
/// the device's [`ResourceArena`](crate::resources::ResourceArena), so a
/// texture shared with another proxy lives until both let go of it.
///
/// A proxy without a device treats every creation call as a no-op.
pub struct ResourceViewProxy {
    device: Option<Arc<GraphicsDevice>>,
    resource: Option<ResourceToken>,
    descriptor: Option<TextureDescriptor>,
    shader_view: Option<ResourceToken>,
    depth_stencil_view: Option<ResourceToken>,
    render_target_view: Option<ResourceToken>,
}

impl ResourceViewProxy {
    pub fn new(device: Option<Arc<GraphicsDevice>>) -> Self {
        Self {
            device,
            resource: None,
            descriptor: None,
            shader_view: None,
            depth_stencil_view: None,
            render_target_view: None,
        }
    }

    /// Build a proxy around tokens obtained elsewhere, e.g. from a cache.
    pub fn from_shared(
        device: Arc<GraphicsDevice>,
        resource: ResourceToken,
        descriptor: TextureDescriptor,
        shader_view: Option<ResourceToken>,
    ) -> Self {
        Self {
            device: Some(device),
            resource: Some(resource),
            descriptor: Some(descriptor),
            shader_view,
            depth_stencil_view: None,
            render_target_view: None,
        }
    }

    /// A second proxy referencing the same texture and views.
    pub fn share(&self) -> Self {
        Self {
            device: self.device.clone(),
            resource: self.resource.as_ref().map(ResourceToken::share),
            descriptor: self.descriptor.clone(),
            shader_view: self.shader_view.as_ref().map(ResourceToken::share),
            depth_stencil_view: self.depth_stencil_view.as_ref().map(ResourceToken::share),
            render_target_view: self.render_target_view.as_ref().map(ResourceToken::share),
        }
    }

    pub fn device(&self) -> Option<&Arc<GraphicsDevice>> {
        self.device.as_ref()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn resource(&self) -> Option<TextureHandle> {
        self.resource.as_ref().and_then(ResourceToken::texture)
    }

    pub fn shader_resource_view(&self) -> Option<TextureViewHandle> {
        self.shader_view.as_ref().and_then(ResourceToken::view)
    }

    pub fn depth_stencil_view(&self) -> Option<TextureViewHandle> {
        self.depth_stencil_view.as_ref().and_then(ResourceToken::view)
    }

    pub fn render_target_view(&self) -> Option<TextureViewHandle> {
        self.render_target_view.as_ref().and_then(ResourceToken::view)
    }

    /// The view of the given kind, if one was created.
    pub fn view(&self, kind: ViewKind) -> Option<TextureViewHandle> {
        match kind {
            ViewKind::ShaderResource => self.shader_resource_view(),
            ViewKind::DepthStencil => self.depth_stencil_view(),
            ViewKind::RenderTarget => self.render_target_view(),
        }
    }

    /// Token of the texture, for sharing it outside of a proxy.
    pub fn resource_token(&self) -> Option<&ResourceToken> {
        self.resource.as_ref()
    }

    /// Token of the view of the given kind.
    pub fn view_token(&self, kind: ViewKind) -> Option<&ResourceToken> {
        match kind {
            ViewKind::ShaderResource => self.shader_view.as_ref(),
            ViewKind::DepthStencil => self.depth_stencil_view.as_ref(),
            ViewKind::RenderTarget => self.render_target_view.as_ref(),
        }
    }

    pub fn descriptor(&self) -> Option<&TextureDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn format(&self) -> Option<TextureFormat> {
        self.descriptor.as_ref().map(|desc| desc.format)
    }

    /// True when the proxy holds neither a texture nor a view.
    pub fn is_empty(&self) -> bool {
        self.resource.is_none()
            && self.shader_view.is_none()
            && self.depth_stencil_view.is_none()
            && self.render_target_view.is_none()
    }

    // ------------------------------------------------------------------
    // Texture creation
    // ------------------------------------------------------------------

    /// Decode a BMP, JPEG, PNG or DDS stream into a texture with a shader view.
    ///
    /// 2D images get a generated mip chain unless `disable_auto_mip_gen` is
    /// set or the container already carries mips. A missing stream or device
    /// leaves the proxy unchanged.
    pub fn create_from_stream<R: Read>(
        &mut self,
        stream: Option<R>,
        disable_auto_mip_gen: bool,
    ) -> GraphicsResult<()> {
        let Some(mut stream) = stream else {
            log::debug!("create_from_stream: no stream, nothing to do");
            return Ok(());
        };
        if !self.has_device("create_from_stream") {
            return Ok(());
        }

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let mut image = TextureImage::from_bytes(&bytes, "stream")?;
        if !disable_auto_mip_gen && image.mip_levels <= 1 {
            image.generate_mips()?;
        }
        self.create_from_image(&image, true)
    }

    /// Upload a decoded image, all of its mip levels included.
    pub fn create_from_image(
        &mut self,
        image: &TextureImage,
        create_view: bool,
    ) -> GraphicsResult<()> {
        let desc = image.descriptor();
        self.create_packed(desc, &image.data, create_view)
    }

    /// 1D texture, one texel per `format`-sized chunk of `data`.
    pub fn create_from_1d_array<T: bytemuck::Pod>(
        &mut self,
        data: &[T],
        format: TextureFormat,
        create_view: bool,
    ) -> GraphicsResult<()> {
        if !self.has_device("create_from_1d_array") {
            return Ok(());
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let texel = format.bytes_per_pixel() as usize;
        if texel == 0 || bytes.is_empty() || bytes.len() % texel != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes do not form a row of {format:?} texels",
                bytes.len()
            )));
        }
        let width = (bytes.len() / texel) as u32;
        self.create_packed(TextureDescriptor::new_1d(width, format), bytes, create_view)
    }

    /// 2D texture. With `mip_count > 1` the array holds every level, level 0 first.
    pub fn create_from_2d_array<T: bytemuck::Pod>(
        &mut self,
        data: &[T],
        width: u32,
        height: u32,
        format: TextureFormat,
        mip_count: u32,
        create_view: bool,
    ) -> GraphicsResult<()> {
        let desc = TextureDescriptor::new_2d(width, height, format).with_mip_levels(mip_count);
        self.create_packed(desc, bytemuck::cast_slice(data), create_view)
    }

    /// 3D texture from a tightly packed array, x fastest then y then z.
    pub fn create_from_3d_array<T: bytemuck::Pod>(
        &mut self,
        data: &[T],
        width: u32,
        height: u32,
        depth: u32,
        format: TextureFormat,
        create_view: bool,
    ) -> GraphicsResult<()> {
        let desc = TextureDescriptor::new_3d(width, height, depth, format);
        self.create_packed(desc, bytemuck::cast_slice(data), create_view)
    }

    /// 3D texture with a shader view from volume parameters.
    ///
    /// Parameters without data leave the proxy unchanged.
    pub fn create_from_volume<T: bytemuck::Pod>(
        &mut self,
        params: &VolumeTextureParams<T>,
    ) -> GraphicsResult<()> {
        let Some(data) = params.data.as_deref() else {
            log::debug!("create_from_volume: no voxel data, nothing to do");
            return Ok(());
        };
        self.create_from_3d_array(
            data,
            params.width,
            params.height,
            params.depth,
            params.format,
            true,
        )
    }

    /// 2D texture read from memory with an explicit row pitch.
    ///
    /// Level 0 spans `row_pitch * height` bytes; further levels follow it
    /// tightly packed. A null pointer leaves the proxy unchanged.
    ///
    /// # Safety
    ///
    /// `data` must be null or valid for reads of that many bytes.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn create_from_pointer_2d(
        &mut self,
        data: *const u8,
        width: u32,
        height: u32,
        row_pitch: u32,
        format: TextureFormat,
        mip_count: u32,
        create_view: bool,
    ) -> GraphicsResult<()> {
        if data.is_null() {
            log::debug!("create_from_pointer_2d: null pointer, nothing to do");
            return Ok(());
        }
        let Some(device) = self.device.clone() else {
            log::debug!("create_from_pointer_2d: no device, nothing to do");
            return Ok(());
        };
        let desc = TextureDescriptor::new_2d(width, height, format).with_mip_levels(mip_count);
        device.limits().check(&desc)?;
        let base = DataLayout {
            bytes_per_row: row_pitch,
            rows_per_image: height,
        };
        check_pitch(&desc, base)?;
        let len = (1..desc.mip_levels).fold(
            row_pitch as usize * height as usize,
            |len, level| len.saturating_add(desc.mip_level_byte_size(level)),
        );
        // SAFETY: the caller guarantees `data` is readable for `len` bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        self.create_with_base_layout(desc, bytes, base, create_view)
    }

    /// 3D texture read from memory with explicit row and slice pitches.
    ///
    /// A null pointer leaves the proxy unchanged.
    ///
    /// # Safety
    ///
    /// `data` must be null or valid for reads of `slice_pitch * depth` bytes.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn create_from_pointer_3d(
        &mut self,
        data: *const u8,
        width: u32,
        height: u32,
        depth: u32,
        row_pitch: u32,
        slice_pitch: u32,
        format: TextureFormat,
        create_view: bool,
    ) -> GraphicsResult<()> {
        if data.is_null() {
            log::debug!("create_from_pointer_3d: null pointer, nothing to do");
            return Ok(());
        }
        let Some(device) = self.device.clone() else {
            log::debug!("create_from_pointer_3d: no device, nothing to do");
            return Ok(());
        };
        if row_pitch == 0 || slice_pitch % row_pitch != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "slice pitch {slice_pitch} is not a multiple of row pitch {row_pitch}"
            )));
        }
        let desc = TextureDescriptor::new_3d(width, height, depth, format);
        device.limits().check(&desc)?;
        let layout = DataLayout {
            bytes_per_row: row_pitch,
            rows_per_image: slice_pitch / row_pitch,
        };
        check_pitch(&desc, layout)?;
        let len = slice_pitch as usize * depth as usize;
        // SAFETY: the caller guarantees `data` is readable for `len` bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        self.create_with_base_layout(desc, bytes, layout, create_view)
    }

    /// Allocate a texture without uploading anything, e.g. a render or depth target.
    pub fn create_empty(
        &mut self,
        desc: &TextureDescriptor,
        create_view: bool,
    ) -> GraphicsResult<()> {
        let Some(device) = self.device.clone() else {
            log::debug!("create_empty: no device, nothing to do");
            return Ok(());
        };
        self.release();
        let texture = device.backend().create_texture(desc)?;
        self.resource = Some(device.arena().acquire(texture));
        self.descriptor = Some(desc.clone());
        if create_view {
            self.create_default_view()?;
        }
        Ok(())
    }

    fn create_packed(
        &mut self,
        desc: TextureDescriptor,
        data: &[u8],
        create_view: bool,
    ) -> GraphicsResult<()> {
        if !self.has_device("create texture") {
            return Ok(());
        }
        let expected = desc.total_byte_size();
        if data.len() != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "{}x{}x{} {:?} with {} mips needs {expected} bytes, got {}",
                desc.width,
                desc.height,
                desc.depth,
                desc.format,
                desc.mip_levels,
                data.len()
            )));
        }
        let layout = DataLayout::packed(desc.format, desc.size());
        self.create_with_base_layout(desc, data, layout, create_view)
    }

    /// Create the texture, upload level 0 with `base` and later levels packed.
    fn create_with_base_layout(
        &mut self,
        desc: TextureDescriptor,
        data: &[u8],
        base: DataLayout,
        create_view: bool,
    ) -> GraphicsResult<()> {
        let Some(device) = self.device.clone() else {
            log::debug!("create texture: no device, nothing to do");
            return Ok(());
        };
        if !desc.format.is_known() {
            return Err(GraphicsError::InvalidParameter(
                "cannot create a texture of unknown format".into(),
            ));
        }

        // The old texture and its views go before the new one exists
        self.release();
        let texture = device.backend().create_texture(&desc)?;
        // Owned from here on so a failed upload still releases it
        let token = device.arena().acquire(texture);

        let mut offset = 0;
        for level in 0..desc.mip_levels {
            let size = desc.size().mip_level_size(level, desc.dimension);
            let layout = if level == 0 {
                base
            } else {
                DataLayout::packed(desc.format, size)
            };
            let len = if level == 0 {
                base.bytes_per_row as usize * base.rows_per_image as usize * size.depth as usize
            } else {
                desc.mip_level_byte_size(level)
            };
            let end = (offset + len).min(data.len());
            device
                .backend()
                .write_texture(texture, level, &data[offset..end], layout, size)?;
            offset = end;
        }

        log::trace!(
            "Created {:?} texture {}x{}x{} {:?}",
            desc.dimension,
            desc.width,
            desc.height,
            desc.depth,
            desc.format
        );
        self.resource = Some(token);
        self.descriptor = Some(desc);
        if create_view {
            self.create_default_view()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Shader view over the current texture. Without a texture this does nothing.
    pub fn create_view(&mut self, desc: &ViewDescriptor) -> GraphicsResult<()> {
        self.create_view_of_kind(ViewKind::ShaderResource, desc)
    }

    pub fn create_depth_stencil_view(&mut self, desc: &ViewDescriptor) -> GraphicsResult<()> {
        self.create_view_of_kind(ViewKind::DepthStencil, desc)
    }

    pub fn create_render_target_view(&mut self, desc: &ViewDescriptor) -> GraphicsResult<()> {
        self.create_view_of_kind(ViewKind::RenderTarget, desc)
    }

    pub fn create_default_view(&mut self) -> GraphicsResult<()> {
        self.create_view(&ViewDescriptor::default())
    }

    pub fn create_default_depth_stencil_view(&mut self) -> GraphicsResult<()> {
        self.create_depth_stencil_view(&ViewDescriptor::default())
    }

    pub fn create_default_render_target_view(&mut self) -> GraphicsResult<()> {
        self.create_render_target_view(&ViewDescriptor::default())
    }

    fn create_view_of_kind(
        &mut self,
        kind: ViewKind,
        desc: &ViewDescriptor,
    ) -> GraphicsResult<()> {
        let (Some(device), Some(texture)) = (self.device.clone(), self.resource()) else {
            log::debug!("create {kind:?} view: no texture, nothing to do");
            return Ok(());
        };
        if let Some(previous) = self.view_slot(kind).take() {
            previous.release();
        }
        let view = device.backend().create_texture_view(texture, desc)?;
        *self.view_slot(kind) = Some(device.arena().acquire(view));
        Ok(())
    }

    fn has_device(&self, operation: &str) -> bool {
        if self.device.is_none() {
            log::debug!("{operation}: no device, nothing to do");
        }
        self.device.is_some()
    }

    fn view_slot(&mut self, kind: ViewKind) -> &mut Option<ResourceToken> {
        match kind {
            ViewKind::ShaderResource => &mut self.shader_view,
            ViewKind::DepthStencil => &mut self.depth_stencil_view,
            ViewKind::RenderTarget => &mut self.render_target_view,
        }
    }

    /// Release the texture and every view, leaving the proxy empty.
    pub fn release(&mut self) {
        for token in [
            self.shader_view.take(),
            self.depth_stencil_view.take(),
            self.render_target_view.take(),
            self.resource.take(),
        ]
        .into_iter()
        .flatten()
        {
            token.release();
        }
        self.descriptor = None;
    }
}

/// Reject pitches that cannot hold a row of `desc` texels.
fn check_pitch(desc: &TextureDescriptor, layout: DataLayout) -> GraphicsResult<()> {
    let row = desc.width * desc.format.bytes_per_pixel();
    if layout.bytes_per_row < row || layout.rows_per_image < desc.height {
        return Err(GraphicsError::InvalidParameter(format!(
            "pitch {layout:?} too small for {}x{} {:?}",
            desc.width, desc.height, desc.format
        )));
    }
    Ok(())
}

impl Drop for ResourceViewProxy {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ResourceViewProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceViewProxy")
            .field("resource", &self.resource())
            .field("shader_view", &self.shader_resource_view())
            .field("depth_stencil_view", &self.depth_stencil_view())
            .field("render_target_view", &self.render_target_view())
            .field("format", &self.format())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceViewProxy: Send, Sync);
