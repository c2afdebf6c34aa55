/// Initialization parameters for the compute device.
///
/// Add configuration flags only when a concrete platform or backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct ContextInit {
    /// Backends the instance may pick adapters from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Use a software adapter (useful on CI machines without a GPU).
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the device.
    ///
    /// `None` requests everything the adapter supports, so large exports can
    /// use the biggest storage buffer the hardware allows.
    pub required_limits: Option<wgpu::Limits>,

    /// Pick this entry of [`Gpu::adapters`](super::Gpu::adapters) instead
    /// of asking wgpu for the preferred adapter.
    pub adapter_index: Option<usize>,
}

impl Default for ContextInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: None,
            adapter_index: None,
        }
    }
}

impl ContextInit {
    /// Defaults adjusted by the environment.
    ///
    /// - `WGPU_BACKEND` restricts backends (wgpu's own syntax, e.g. `vulkan,metal`)
    /// - `CLAM_ADAPTER` is one of `high-performance`, `low-power`, `fallback`
    /// - `CLAM_DEVICE` selects an adapter by index
    pub fn from_env() -> Self {
        let mut init = Self::default();
        if let Some(backends) = wgpu::Backends::from_env() {
            init.backends = backends;
        }
        if let Ok(adapter) = std::env::var("CLAM_ADAPTER") {
            init.apply_adapter_choice(&adapter);
        }
        if let Ok(index) = std::env::var("CLAM_DEVICE") {
            init.adapter_index = parse_adapter_index(&index);
        }
        init
    }

    fn apply_adapter_choice(&mut self, choice: &str) {
        match choice.trim().to_ascii_lowercase().as_str() {
            "high-performance" => self.power_preference = wgpu::PowerPreference::HighPerformance,
            "low-power" => self.power_preference = wgpu::PowerPreference::LowPower,
            "fallback" => self.force_fallback_adapter = true,
            other => log::warn!("ignoring unknown CLAM_ADAPTER value `{other}`"),
        }
    }
}

fn parse_adapter_index(text: &str) -> Option<usize> {
    let index = text.trim().parse().ok();
    if index.is_none() {
        log::warn!("ignoring CLAM_DEVICE value `{text}`; expected an adapter index");
    }
    index
}
