// SPDX-License-Identifier: AGPL-3.0-only

//! wgpu compute device for instruction-rate measurement.
//!
//! Creates a wgpu device with `SHADER_F64` / `SHADER_INT64` enabled when the
//! adapter offers them, and implements [`ComputeBackend`] on top of it.
//!
//! ## Adapter selection
//!
//! | `INSTRATE_GPU_ADAPTER` | Behavior |
//! |-------|----------|
//! | *(unset)* / `auto` | discrete GPU first, then integrated, then anything |
//! | `0`, `1`, … | Select adapter by enumeration index |
//! | substring | Case-insensitive name match (e.g. `"titan"`, `"4070"`) |
//!
//! ## Module structure
//!
//! - `adapter`: adapter discovery and selection
//! - `buffers`: device buffer creation and blocking upload
//! - `dispatch`: pipeline build, binding, dispatch and queue drain

mod adapter;
mod buffers;
mod dispatch;

pub use adapter::AdapterInfo;
pub use dispatch::{split_workgroups, GpuKernel};

use crate::backend::{ComputeBackend, DispatchGrid, KernelArgs};
use crate::capability::{supported_by, Capability, CapabilityProbe};
use crate::error::InstructionRateError;
use crate::kernels::KernelDescriptor;

/// A wgpu device and queue, with the features that were enabled on it.
#[must_use]
pub struct GpuDevice {
    pub adapter_name: String,
    pub driver: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    features: wgpu::Features,
    limits: wgpu::Limits,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

// ── Core accessors ───────────────────────────────────────────────────

impl GpuDevice {
    /// Access the underlying wgpu Device.
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access the underlying wgpu Queue.
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Features enabled on the device (not merely offered by the adapter).
    #[must_use]
    pub const fn features(&self) -> wgpu::Features {
        self.features
    }

    #[must_use]
    pub const fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }
}

// ── Constructor ──────────────────────────────────────────────────────

impl GpuDevice {
    /// Create a device on the selected adapter.
    ///
    /// Optional shader features are requested only when the adapter has
    /// them; absence is discovered later through [`CapabilityProbe`].
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError`] if no adapter is found or device
    /// creation fails.
    pub async fn new() -> Result<Self, InstructionRateError> {
        let selected = adapter::select_adapter()?;
        let adapter_info = selected.get_info();
        let adapter_features = selected.features();
        let adapter_limits = selected.limits();

        let required_features = optional_features(adapter_features);

        let required_limits = wgpu::Limits {
            max_compute_workgroup_size_x: adapter_limits.max_compute_workgroup_size_x,
            max_compute_invocations_per_workgroup: adapter_limits
                .max_compute_invocations_per_workgroup,
            max_compute_workgroups_per_dimension: adapter_limits
                .max_compute_workgroups_per_dimension,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("instruction rate device"),
                    required_features,
                    required_limits: required_limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| InstructionRateError::DeviceCreation(e.to_string()))?;

        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            features = ?device.features(),
            "device created"
        );

        Ok(Self {
            adapter_name: adapter_info.name,
            driver: adapter_info.driver,
            backend: adapter_info.backend,
            device_type: adapter_info.device_type,
            features: device.features(),
            limits: required_limits,
            device,
            queue,
        })
    }

    /// Enumerate all available GPU adapters.
    #[must_use]
    pub fn enumerate_adapters() -> Vec<AdapterInfo> {
        adapter::enumerate_adapters()
    }

    /// Print device capabilities.
    pub fn print_info(&self) {
        let yes_no = |c: Capability| if self.supports(c) { "YES" } else { "NO" };
        println!("  GPU: {}", self.adapter_name);
        println!(
            "  Driver: {}, Backend: {:?}, Type: {}",
            self.driver,
            self.backend,
            adapter::device_type_label(self.device_type)
        );
        println!("  SHADER_F64: {}", yes_no(Capability::Fp64));
        println!("  SHADER_INT64: {}", yes_no(Capability::Int64));
        println!(
            "  Max workgroup size: {} ({} invocations)",
            self.limits.max_compute_workgroup_size_x,
            self.limits.max_compute_invocations_per_workgroup
        );
    }

    /// Print all available adapters to stdout.
    pub fn print_available_adapters() {
        let adapters = Self::enumerate_adapters();
        println!("  Available GPU adapters:");
        for info in &adapters {
            println!("    {info}");
        }
        if adapters.is_empty() {
            println!("    (none found)");
        }
    }
}

/// The capability features `adapter` offers; nothing else is requested.
#[must_use]
pub fn optional_features(adapter: wgpu::Features) -> wgpu::Features {
    [Capability::Fp64, Capability::Int64]
        .into_iter()
        .map(Capability::wgpu_feature)
        .filter(|f| adapter.contains(*f))
        .fold(wgpu::Features::empty(), |acc, f| acc | f)
}

impl CapabilityProbe for GpuDevice {
    fn supports(&self, capability: Capability) -> bool {
        supported_by(self.features, capability)
    }
}

impl ComputeBackend for GpuDevice {
    type Buffer = wgpu::Buffer;
    type Kernel = GpuKernel;

    fn create_buffer(
        &self,
        label: &'static str,
        size_bytes: u64,
    ) -> Result<Self::Buffer, InstructionRateError> {
        self.create_storage_buffer(label, size_bytes)
    }

    fn build_kernel(
        &self,
        descriptor: &KernelDescriptor,
        local_group_size: u32,
    ) -> Result<Self::Kernel, InstructionRateError> {
        self.build_rate_kernel(descriptor, local_group_size)
    }

    fn upload(&self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<(), InstructionRateError> {
        self.upload_blocking(buffer, bytes)
    }

    fn bind(
        &self,
        kernel: &mut Self::Kernel,
        args: KernelArgs<'_, Self::Buffer>,
    ) -> Result<(), InstructionRateError> {
        self.bind_rate_kernel(kernel, &args)
    }

    fn enqueue(
        &self,
        kernel: &Self::Kernel,
        grid: DispatchGrid,
    ) -> Result<(), InstructionRateError> {
        self.enqueue_rate_kernel(kernel, grid)
    }

    fn finish(&self) -> Result<(), InstructionRateError> {
        self.drain()
    }
}
