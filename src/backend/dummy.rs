//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but keeps the same
//! bookkeeping a real device would: descriptors, live views, upload size
//! validation. It also counts destroy calls so tests can check that every
//! native handle is released exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    limits: DeviceLimits,
    textures: Mutex<HashMap<u64, TextureDescriptor>>,
    views: Mutex<HashMap<u64, TextureHandle>>,
    next_id: AtomicU64,
    destroyed: AtomicUsize,
    double_destroys: AtomicUsize,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Create a dummy backend reporting custom limits.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            textures: Mutex::new(HashMap::new()),
            views: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            destroyed: AtomicUsize::new(0),
            double_destroys: AtomicUsize::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of successful destroy calls.
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Number of destroy calls on handles that were already gone.
    pub fn double_destroy_count(&self) -> usize {
        self.double_destroys.load(Ordering::Acquire)
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures.lock().len()
    }

    /// Number of live views.
    pub fn view_count(&self) -> usize {
        self.views.lock().len()
    }

    /// Texture a live view was created from.
    pub fn view_texture(&self, view: TextureViewHandle) -> Option<TextureHandle> {
        self.views.lock().get(&view.0).copied()
    }

    fn record_destroy(&self, found: bool, what: &str, id: u64) {
        if found {
            self.destroyed.fetch_add(1, Ordering::AcqRel);
            log::trace!("DummyBackend: destroyed {what} {id}");
        } else {
            self.double_destroys.fetch_add(1, Ordering::AcqRel);
            log::error!("DummyBackend: {what} {id} destroyed twice or never created");
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        self.limits.check(desc)?;
        let id = self.next_id();
        log::trace!(
            "DummyBackend: creating texture {id} {:?} ({}x{}x{}, {:?}, {} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.depth,
            desc.format,
            desc.mip_levels
        );
        self.textures.lock().insert(id, desc.clone());
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
        let desc = textures.get(&texture.0).ok_or(BackendError::InvalidHandle)?;
        if mip_level >= desc.mip_levels {
            return Err(BackendError::TextureCreationFailed(format!(
                "mip level {mip_level} out of range ({} levels)",
                desc.mip_levels
            )));
        }
        let level_size = desc.size().mip_level_size(mip_level, desc.dimension);
        if size.width > level_size.width
            || size.height > level_size.height
            || size.depth > level_size.depth
        {
            return Err(BackendError::TextureCreationFailed(format!(
                "upload {size:?} exceeds mip level size {level_size:?}"
            )));
        }
        let required = layout.required_len(desc.format, size);
        if data.len() < required {
            return Err(BackendError::TextureCreationFailed(format!(
                "upload needs {required} bytes, got {}",
                data.len()
            )));
        }
        log::trace!(
            "DummyBackend: write_texture {} mip={} len={}",
            texture.0,
            mip_level,
            data.len()
        );
        Ok(())
    }

    fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.textures.lock().get(&texture.0).cloned()
    }

    fn create_texture_view(
        &self,
        texture: TextureHandle,
        desc: &ViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let textures = self.textures.lock();
        let tex = textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::ViewCreationFailed("Texture not found".into()))?;
        let mip_count = desc
            .mip_level_count
            .unwrap_or(tex.mip_levels - desc.base_mip_level.min(tex.mip_levels));
        if desc.base_mip_level + mip_count > tex.mip_levels || mip_count == 0 {
            return Err(BackendError::ViewCreationFailed(format!(
                "mip range {}..{} outside texture with {} levels",
                desc.base_mip_level,
                desc.base_mip_level + mip_count,
                tex.mip_levels
            )));
        }
        drop(textures);

        let id = self.next_id();
        log::trace!("DummyBackend: creating view {id} of texture {}", texture.0);
        self.views.lock().insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        let found = self.textures.lock().remove(&texture.0).is_some();
        self.record_destroy(found, "texture", texture.0);
    }

    fn destroy_texture_view(&self, view: TextureViewHandle) {
        let found = self.views.lock().remove(&view.0).is_some();
        self.record_destroy(found, "view", view.0);
    }

    fn live_resource_count(&self) -> usize {
        self.texture_count() + self.view_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let backend = DummyBackend::new();
        let tex = backend
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let view = backend
            .create_texture_view(tex, &ViewDescriptor::default())
            .unwrap();
        assert_eq!(backend.live_resource_count(), 2);
        assert_eq!(backend.view_texture(view), Some(tex));

        backend.destroy_texture_view(view);
        backend.destroy_texture(tex);
        assert_eq!(backend.live_resource_count(), 0);
        assert_eq!(backend.destroyed_count(), 2);
        assert_eq!(backend.double_destroy_count(), 0);

        backend.destroy_texture(tex);
        assert_eq!(backend.double_destroy_count(), 1);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let backend = DummyBackend::new();
        let result =
            backend.create_texture(&TextureDescriptor::new_3d(2, 2, 2, TextureFormat::Unknown));
        assert_eq!(
            result,
            Err(BackendError::UnsupportedFormat(TextureFormat::Unknown))
        );
    }

    #[test]
    fn test_rejects_short_upload() {
        let backend = DummyBackend::new();
        let desc = TextureDescriptor::new_3d(2, 2, 2, TextureFormat::R8Unorm);
        let tex = backend.create_texture(&desc).unwrap();
        let layout = DataLayout::packed(desc.format, desc.size());
        assert!(backend
            .write_texture(tex, 0, &[0u8; 7], layout, desc.size())
            .is_err());
        assert!(backend
            .write_texture(tex, 0, &[0u8; 8], layout, desc.size())
            .is_ok());
    }

    #[test]
    fn test_view_mip_range_checked() {
        let backend = DummyBackend::new();
        let tex = backend
            .create_texture(
                &TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm).with_mip_levels(2),
            )
            .unwrap();
        assert!(backend
            .create_texture_view(tex, &ViewDescriptor::single_mip(1))
            .is_ok());
        assert!(backend
            .create_texture_view(tex, &ViewDescriptor::single_mip(2))
            .is_err());
    }
}
