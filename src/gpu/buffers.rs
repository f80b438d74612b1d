// SPDX-License-Identifier: AGPL-3.0-only

//! Device buffer creation and blocking upload.

use super::GpuDevice;
use crate::error::InstructionRateError;

impl GpuDevice {
    /// Create a storage buffer that can be written from the host.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Allocation`] if the device is out of
    /// memory or the size exceeds its limits.
    pub fn create_storage_buffer(
        &self,
        label: &'static str,
        size_bytes: u64,
    ) -> Result<wgpu::Buffer, InstructionRateError> {
        self.device().push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(self.device().pop_error_scope());
        let oom = pollster::block_on(self.device().pop_error_scope());
        if let Some(e) = validation.or(oom) {
            tracing::error!(label, size_bytes, error = %e, "device buffer allocation failed");
            return Err(InstructionRateError::Allocation {
                what: label,
                bytes: size_bytes,
            });
        }
        Ok(buffer)
    }

    /// Create the 16-byte uniform buffer holding a kernel's parameters.
    #[must_use]
    pub fn create_params_buffer(&self, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<super::dispatch::RateParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Copy `bytes` into `buffer` at offset 0 and wait until the copy has
    /// landed on the device.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Completion`] if the queue does not
    /// drain.
    pub fn upload_blocking(
        &self,
        buffer: &wgpu::Buffer,
        bytes: &[u8],
    ) -> Result<(), InstructionRateError> {
        self.queue().write_buffer(buffer, 0, bytes);
        self.drain()
    }
}
