// SPDX-License-Identifier: AGPL-3.0-only

//! Pipeline build, binding, dispatch and queue drain.
//!
//! Bind layout shared by every rate kernel:
//!
//! ```text
//! @binding(0)  input   storage, read
//! @binding(1)  params  uniform { iterations, thread_count }
//! @binding(2)  result  storage, read_write
//! ```

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};

use super::GpuDevice;
use crate::backend::{DispatchGrid, KernelArgs};
use crate::capability::CapabilityProbe;
use crate::error::InstructionRateError;
use crate::kernels::KernelDescriptor;

/// Uniform block at binding 1, padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RateParams {
    pub iterations: u32,
    pub thread_count: u32,
    pub _pad: [u32; 2],
}

/// A compiled rate kernel with its parameter block.
#[derive(Debug)]
pub struct GpuKernel {
    pub name: &'static str,
    pipeline: wgpu::ComputePipeline,
    params: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

/// Split workgroup count into (x, y, 1) for 2D dispatch when x > 65535.
/// Shaders must linearize via `gid.x + gid.y * num_workgroups.x * WG_SIZE`.
#[must_use]
pub fn split_workgroups(total: u32) -> (u32, u32, u32) {
    if total <= 65535 {
        (total, 1, 1)
    } else {
        let y = total.div_ceil(65535);
        let x = total.div_ceil(y);
        (x, y, 1)
    }
}

impl GpuDevice {
    /// Compile a rate kernel. Validation errors are captured in an error
    /// scope instead of reaching the uncaptured-error handler.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::KernelBuild`] if the WGSL does not
    /// compile or the pipeline is rejected (e.g. workgroup too large).
    pub fn build_rate_kernel(
        &self,
        descriptor: &KernelDescriptor,
        local_group_size: u32,
    ) -> Result<GpuKernel, InstructionRateError> {
        let wgsl = descriptor.render_source(local_group_size, |c| self.supports(c));

        self.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(descriptor.name),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });
        let pipeline = self
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(descriptor.name),
                layout: None,
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        let params = self.create_params_buffer(descriptor.name);

        if let Some(e) = pollster::block_on(self.device().pop_error_scope()) {
            return Err(InstructionRateError::KernelBuild {
                kernel: descriptor.name,
                reason: e.to_string(),
            });
        }
        Ok(GpuKernel {
            name: descriptor.name,
            pipeline,
            params,
            bind_group: None,
        })
    }

    /// Write the parameter block and bind input / params / result.
    ///
    /// The parameter write is flushed before returning so nothing is
    /// transferred inside the timed dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Submission`] if the bind group is
    /// rejected.
    pub fn bind_rate_kernel(
        &self,
        kernel: &mut GpuKernel,
        args: &KernelArgs<'_, wgpu::Buffer>,
    ) -> Result<(), InstructionRateError> {
        let params = RateParams {
            iterations: args.iterations,
            thread_count: args.grid.global,
            _pad: [0; 2],
        };
        self.queue()
            .write_buffer(&kernel.params, 0, bytemuck::bytes_of(&params));

        self.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let layout = kernel.pipeline.get_bind_group_layout(0);
        let bind_group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.name),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: args.input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: kernel.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: args.result.as_entire_binding(),
                },
            ],
        });
        if let Some(e) = pollster::block_on(self.device().pop_error_scope()) {
            return Err(InstructionRateError::Submission(e.to_string()));
        }
        kernel.bind_group = Some(bind_group);
        Ok(())
    }

    /// Encode and submit one dispatch over `grid`. Does not wait.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Submission`] if the kernel was never
    /// bound or wgpu rejects the pass or the submission.
    pub fn enqueue_rate_kernel(
        &self,
        kernel: &GpuKernel,
        grid: DispatchGrid,
    ) -> Result<(), InstructionRateError> {
        let bind_group = kernel.bind_group.as_ref().ok_or_else(|| {
            InstructionRateError::Submission(format!("{} dispatched before bind", kernel.name))
        })?;

        self.device().push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.name),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            let (wx, wy, wz) = split_workgroups(grid.workgroups());
            pass.dispatch_workgroups(wx, wy, wz);
        }
        self.queue().submit(std::iter::once(encoder.finish()));

        let validation = pollster::block_on(self.device().pop_error_scope());
        let oom = pollster::block_on(self.device().pop_error_scope());
        match validation.or(oom) {
            Some(e) => Err(InstructionRateError::Submission(e.to_string())),
            None => Ok(()),
        }
    }

    /// Flush staged writes and block until the queue signals that all
    /// submitted work is done.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Completion`] if the completion
    /// callback never fires.
    pub fn drain(&self) -> Result<(), InstructionRateError> {
        let (tx, rx) = mpsc::channel();
        self.queue().submit(std::iter::empty());
        self.queue().on_submitted_work_done(move || {
            let _ = tx.send(());
        });
        self.device().poll(wgpu::Maintain::Wait);
        rx.try_recv().map_err(|_| {
            InstructionRateError::Completion("queue did not signal work done after wait".into())
        })
    }
}
