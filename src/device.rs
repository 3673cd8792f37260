//! Graphics device: a backend plus the arena and cache owning its textures.

use std::sync::Arc;

use crate::backend::{self, DeviceLimits, GpuBackend};
use crate::config::DeviceParameters;
use crate::error::GraphicsResult;
use crate::resources::{ResourceArena, TextureCache};

/// A device that textures and views are created on.
///
/// Shared as `Arc<GraphicsDevice>`; proxies keep a reference to it.
pub struct GraphicsDevice {
    name: String,
    backend: Arc<dyn GpuBackend>,
    arena: ResourceArena,
    texture_cache: TextureCache,
}

impl GraphicsDevice {
    /// Create a device on the backend selected by `params`.
    pub fn new(params: &DeviceParameters) -> GraphicsResult<Arc<Self>> {
        let backend = backend::create_backend(params)?;
        log::info!(
            "Created graphics device '{}' on {} backend",
            params.label,
            backend.name()
        );
        Ok(Self::build(params.label.clone(), backend))
    }

    /// Create a device on an existing backend.
    pub fn with_backend(backend: Arc<dyn GpuBackend>) -> Arc<Self> {
        let name = format!("{} device", backend.name());
        Self::build(name, backend)
    }

    fn build(name: String, backend: Arc<dyn GpuBackend>) -> Arc<Self> {
        Arc::new(Self {
            name,
            arena: ResourceArena::new(Arc::clone(&backend)),
            backend,
            texture_cache: TextureCache::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn arena(&self) -> &ResourceArena {
        &self.arena
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.texture_cache
    }

    pub fn limits(&self) -> DeviceLimits {
        self.backend.limits()
    }

    /// Textures and views alive on the backend.
    pub fn live_resource_count(&self) -> usize {
        self.backend.live_resource_count()
    }

    /// Release every cached and tracked handle.
    ///
    /// Proxies outliving this call hold dead tokens; releasing them is a no-op.
    pub fn release_all(&self) {
        self.texture_cache.clear();
        self.arena.release_all();
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("tracked", &self.arena.tracked_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
