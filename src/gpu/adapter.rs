// SPDX-License-Identifier: AGPL-3.0-only

//! GPU adapter discovery and selection.
//!
//! Runtime capability probing, no hardcoded GPU assumptions. The adapter
//! is selected by environment variable or auto-detected by device type.

use crate::error::InstructionRateError;

/// Summary of a discovered GPU adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Enumeration index (stable within a single run).
    pub index: usize,
    /// Adapter name as reported by the driver.
    pub name: String,
    /// Driver name (e.g. `"NVIDIA"`, `"radv"`).
    pub driver: String,
    pub backend: wgpu::Backend,
    pub has_f64: bool,
    pub has_int64: bool,
    pub device_type: wgpu::DeviceType,
}

impl std::fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = device_type_label(self.device_type);
        let f64_tag = if self.has_f64 { "f64" } else { "no-f64" };
        let i64_tag = if self.has_int64 { "i64" } else { "no-i64" };
        write!(
            f,
            "[{}] {} ({}, {:?}, {}, {}, {})",
            self.index, self.name, self.driver, self.backend, kind, f64_tag, i64_tag
        )
    }
}

pub(crate) const fn device_type_label(device_type: wgpu::DeviceType) -> &'static str {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => "discrete",
        wgpu::DeviceType::IntegratedGpu => "integrated",
        wgpu::DeviceType::VirtualGpu => "virtual",
        wgpu::DeviceType::Cpu => "cpu",
        wgpu::DeviceType::Other => "other",
    }
}

/// Parse `INSTRATE_WGPU_BACKEND`.
#[must_use]
pub fn backends_from(value: Option<&str>) -> wgpu::Backends {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("vulkan") => wgpu::Backends::VULKAN,
        Some("metal") => wgpu::Backends::METAL,
        Some("dx12") => wgpu::Backends::DX12,
        _ => wgpu::Backends::all(),
    }
}

/// Create a wgpu instance with the backend configured via `INSTRATE_WGPU_BACKEND`.
pub fn create_instance() -> wgpu::Instance {
    let backends = backends_from(std::env::var("INSTRATE_WGPU_BACKEND").ok().as_deref());
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    })
}

/// Enumerate all available GPU adapters.
///
/// Use the `index` field with `INSTRATE_GPU_ADAPTER=<index>` to target a
/// specific GPU.
#[must_use]
pub fn enumerate_adapters() -> Vec<AdapterInfo> {
    let instance = create_instance();
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .enumerate()
        .map(|(i, adapter)| {
            let info = adapter.get_info();
            let features = adapter.features();
            AdapterInfo {
                index: i,
                name: info.name.clone(),
                driver: info.driver.clone(),
                backend: info.backend,
                has_f64: features.contains(wgpu::Features::SHADER_F64),
                has_int64: features.contains(wgpu::Features::SHADER_INT64),
                device_type: info.device_type,
            }
        })
        .collect()
}

/// Select an adapter based on `INSTRATE_GPU_ADAPTER`. Falls back to
/// auto-detection (discrete, then integrated, then anything).
///
/// # Errors
///
/// Returns [`InstructionRateError::NoAdapter`] if nothing is found, or
/// [`InstructionRateError::DeviceCreation`] if the selector matches nothing.
pub fn select_adapter() -> Result<wgpu::Adapter, InstructionRateError> {
    let selector = std::env::var("INSTRATE_GPU_ADAPTER")
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let instance = create_instance();
    let adapters: Vec<wgpu::Adapter> = instance.enumerate_adapters(wgpu::Backends::all());
    if adapters.is_empty() {
        return Err(InstructionRateError::NoAdapter);
    }

    if selector.is_empty() || selector == "auto" {
        auto_select(adapters)
    } else if let Ok(idx) = selector.parse::<usize>() {
        select_by_index_or_name(adapters, idx, &selector)
    } else {
        select_by_name(adapters, &selector)
    }
}

/// Lower is better.
const fn preference(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 3,
        wgpu::DeviceType::Cpu => 4,
    }
}

fn auto_select(adapters: Vec<wgpu::Adapter>) -> Result<wgpu::Adapter, InstructionRateError> {
    adapters
        .into_iter()
        .min_by_key(|a| preference(a.get_info().device_type))
        .ok_or(InstructionRateError::NoAdapter)
}

fn select_by_index_or_name(
    adapters: Vec<wgpu::Adapter>,
    idx: usize,
    selector: &str,
) -> Result<wgpu::Adapter, InstructionRateError> {
    if idx < adapters.len() {
        adapters
            .into_iter()
            .nth(idx)
            .ok_or(InstructionRateError::NoAdapter)
    } else {
        adapters
            .into_iter()
            .find(|a| a.get_info().name.to_ascii_lowercase().contains(selector))
            .ok_or_else(|| {
                InstructionRateError::DeviceCreation(format!(
                    "No adapter matching '{selector}' (tried as index {idx} and name)"
                ))
            })
    }
}

fn select_by_name(
    adapters: Vec<wgpu::Adapter>,
    selector: &str,
) -> Result<wgpu::Adapter, InstructionRateError> {
    adapters
        .into_iter()
        .find(|a| a.get_info().name.to_ascii_lowercase().contains(selector))
        .ok_or_else(|| {
            InstructionRateError::DeviceCreation(format!("No adapter matching '{selector}'"))
        })
}
