// SPDX-License-Identifier: AGPL-3.0-only

//! The device seam the runner and orchestrator are generic over.
//!
//! [`crate::gpu::GpuDevice`] implements it on wgpu. The test suite
//! implements it with a recording backend.

use crate::capability::CapabilityProbe;
use crate::error::InstructionRateError;
use crate::kernels::KernelDescriptor;

/// 1-D dispatch shape: `global` work-items in groups of `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub global: u32,
    pub local: u32,
}

impl DispatchGrid {
    #[must_use]
    pub const fn new(global: u32, local: u32) -> Self {
        Self { global, local }
    }

    /// Workgroups needed to cover `global` work-items.
    #[must_use]
    pub const fn workgroups(&self) -> u32 {
        self.global.div_ceil(self.local)
    }
}

/// Parameters bound to a kernel before dispatch, in binding order.
#[derive(Debug)]
pub struct KernelArgs<'a, B> {
    /// Binding 0.
    pub input: &'a B,
    /// Binding 1, together with the grid size.
    pub iterations: u32,
    /// Binding 2.
    pub result: &'a B,
    pub grid: DispatchGrid,
}

/// A compute device that can run one timed rate test at a time.
///
/// Every method blocks until its effect is complete on the device, except
/// [`Self::enqueue`], which only submits.
pub trait ComputeBackend: CapabilityProbe {
    type Buffer;
    type Kernel;

    /// Allocate a device buffer of `size_bytes`.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::Allocation`] if the device is out of memory.
    fn create_buffer(
        &self,
        label: &'static str,
        size_bytes: u64,
    ) -> Result<Self::Buffer, InstructionRateError>;

    /// Compile `descriptor` with workgroups of `local_group_size`.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::KernelBuild`] on compile or pipeline failure.
    fn build_kernel(
        &self,
        descriptor: &KernelDescriptor,
        local_group_size: u32,
    ) -> Result<Self::Kernel, InstructionRateError>;

    /// Blocking host-to-device copy into `buffer` at offset 0.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::Completion`] if the transfer does not finish.
    fn upload(&self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<(), InstructionRateError>;

    /// Bind input, iteration count and result to `kernel`.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::Submission`] if the device rejects the binding.
    fn bind(
        &self,
        kernel: &mut Self::Kernel,
        args: KernelArgs<'_, Self::Buffer>,
    ) -> Result<(), InstructionRateError>;

    /// Submit one dispatch of `kernel` over `grid`. Does not wait.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::Submission`] if the device rejects it.
    fn enqueue(&self, kernel: &Self::Kernel, grid: DispatchGrid)
        -> Result<(), InstructionRateError>;

    /// Block until all submitted work has completed.
    ///
    /// # Errors
    ///
    /// [`InstructionRateError::Completion`] if the device reports an error.
    fn finish(&self) -> Result<(), InstructionRateError>;
}
