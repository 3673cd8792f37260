//! Backend abstraction layer
//!
//! Provides the [`GpuBackend`] trait and the types both backends share.
//!
//! # Available Backends
//!
//! - `dummy` (always compiled): No-op backend for testing and development
//! - `wgpu-backend` (default feature): Headless cross-platform backend using wgpu

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

use std::sync::Arc;

pub use dummy::DummyBackend;
pub use traits::*;
pub use types::*;

use crate::config::{BackendType, DeviceParameters};

/// Selects and creates the backend requested by `params`.
pub fn create_backend(params: &DeviceParameters) -> BackendResult<Arc<dyn GpuBackend>> {
    if params.backend == BackendType::Dummy {
        log::info!("Using dummy backend");
        return Ok(Arc::new(DummyBackend::new()));
    }

    let error = match try_create_wgpu(params) {
        Ok(backend) => return Ok(backend),
        Err(e) => e,
    };

    if params.fallback_to_dummy || params.backend == BackendType::Auto {
        log::warn!("Failed to create wgpu backend: {}; falling back to dummy", error);
        return Ok(Arc::new(DummyBackend::new()));
    }

    Err(error)
}

#[cfg(feature = "wgpu-backend")]
fn try_create_wgpu(params: &DeviceParameters) -> BackendResult<Arc<dyn GpuBackend>> {
    let backend = wgpu_backend::WgpuBackend::new(params)?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn try_create_wgpu(_params: &DeviceParameters) -> BackendResult<Arc<dyn GpuBackend>> {
    Err(BackendError::InitializationFailed(
        "crate built without the wgpu-backend feature".into(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}
