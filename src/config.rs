//! Device configuration.

/// Environment variable overriding the backend selection.
pub const BACKEND_ENV_VAR: &str = "VOLUME_GRAPHICS_BACKEND";

/// Backend selection for the graphics device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// No GPU; resources are bookkeeping only
    Dummy,
    /// Headless wgpu device
    Wgpu,
    /// wgpu when it is compiled in and an adapter exists, dummy otherwise
    #[default]
    Auto,
}

impl BackendType {
    /// Parse a backend name as accepted by [`BACKEND_ENV_VAR`].
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dummy" | "null" => Some(Self::Dummy),
            "wgpu" | "gpu" => Some(Self::Wgpu),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Adapter power preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
}

/// Parameters for creating a [`GraphicsDevice`](crate::GraphicsDevice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Which backend to use
    pub backend: BackendType,
    /// Adapter power preference (wgpu only)
    pub power_preference: PowerPreference,
    /// Debug label of the device
    pub label: String,
    /// Fall back to the dummy backend when the requested one fails
    pub fallback_to_dummy: bool,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            power_preference: PowerPreference::HighPerformance,
            label: "Volume Graphics Device".to_string(),
            fallback_to_dummy: true,
        }
    }
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the backend taken from [`BACKEND_ENV_VAR`] if it is set.
    pub fn from_env() -> Self {
        let mut params = Self::default();
        if let Ok(value) = std::env::var(BACKEND_ENV_VAR) {
            match BackendType::parse(&value) {
                Some(backend) => params.backend = backend,
                None => log::warn!("Ignoring unknown {BACKEND_ENV_VAR} value {value:?}"),
            }
        }
        params
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_power_preference(mut self, preference: PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_fallback_to_dummy(mut self, fallback: bool) -> Self {
        self.fallback_to_dummy = fallback;
        self
    }
}
