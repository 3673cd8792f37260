//! Common utilities for device integration tests.
//!
//! Tests are parameterized over [`Backend`]; a backend that cannot be created
//! on this machine makes [`TestContext::new`] return `None` and the test skips.

use std::path::PathBuf;
use std::sync::Arc;

use volume_graphics::{BackendType, DeviceParameters, GraphicsDevice};

/// Available backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (no actual GPU operations).
    Dummy,
    /// Headless wgpu device.
    Wgpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            Backend::Wgpu => volume_graphics::backend::has_gpu_backend(),
        }
    }

    pub fn to_device_parameters(self) -> DeviceParameters {
        let backend = match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Wgpu => BackendType::Wgpu,
        };
        DeviceParameters::new()
            .with_backend(backend)
            .with_label(format!("{self:?} test device"))
            .with_fallback_to_dummy(false)
    }
}

/// Test context owning the device under test.
pub struct TestContext {
    #[allow(dead_code)]
    pub backend: Backend,
    pub device: Arc<GraphicsDevice>,
}

impl TestContext {
    /// Create a context for the given backend.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }
        let device = GraphicsDevice::new(&backend.to_device_parameters()).ok()?;
        Some(Self { backend, device })
    }

    /// Handles the arena currently owns.
    pub fn tracked(&self) -> usize {
        self.device.arena().tracked_count()
    }

    /// Textures and views alive on the backend.
    pub fn live(&self) -> usize {
        self.device.live_resource_count()
    }
}

/// A file in the temp directory, removed on drop.
pub struct TempFile {
    pub path: PathBuf,
}

impl TempFile {
    pub fn with_contents(name: &str, contents: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!(
            "volume-graphics-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).expect("Failed to write temp file");
        Self { path }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
