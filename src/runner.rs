// SPDX-License-Identifier: AGPL-3.0-only

//! One timed kernel dispatch and the rate it implies.
//!
//! ```text
//! zero result → upload input + result (blocking) → bind → finish
//!   ┌── timed ────────────────────────────┐
//!   │ enqueue → finish                    │
//!   └─────────────────────────────────────┘
//! rate = (total_ops / 1e9) / (elapsed_ms / 1000)
//! ```
//!
//! Only kernel execution sits inside the timed window. Transfers and
//! pipeline creation happen before the timer starts.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::backend::{ComputeBackend, DispatchGrid, KernelArgs};
use crate::config::TestConfiguration;
use crate::error::InstructionRateError;
use crate::workload::{try_zeroed, WorkloadArena};

/// Host arena, host result array, and their device counterparts.
///
/// Created once per run and reused by every sub-test. Dropping it releases
/// host memory and device buffers.
pub struct RunBuffers<B: ComputeBackend> {
    pub arena: WorkloadArena,
    pub host_result: Vec<u32>,
    pub device_input: B::Buffer,
    pub device_result: B::Buffer,
}

impl<B: ComputeBackend> RunBuffers<B> {
    /// Allocate host and device storage sized for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Allocation`] if any host or device
    /// allocation fails.
    pub fn allocate(backend: &B, config: &TestConfiguration) -> Result<Self, InstructionRateError> {
        let arena = WorkloadArena::for_config(config)?;
        let host_result = try_zeroed::<u32>(config.result_words(), "host result array")?;
        let device_input = backend.create_buffer("rate_input", arena.len_bytes() as u64)?;
        let device_result =
            backend.create_buffer("rate_result", (host_result.len() * 4) as u64)?;
        Ok(Self {
            arena,
            host_result,
            device_input,
            device_result,
        })
    }
}

/// Outcome of one successful timed dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub elapsed: Duration,
    pub giga_ops_per_second: f64,
}

/// Convert an operation count and elapsed time to giga-ops per second.
///
/// # Errors
///
/// Returns [`InstructionRateError::Measurement`] if `elapsed` is zero.
pub fn giga_ops_per_second(total_ops: u64, elapsed: Duration) -> Result<f64, InstructionRateError> {
    let elapsed_ms = elapsed.as_secs_f64() * 1e3;
    if elapsed_ms <= 0.0 {
        return Err(InstructionRateError::Measurement(format!(
            "elapsed time of {elapsed_ms} ms for {total_ops} ops"
        )));
    }
    Ok((total_ops as f64 / 1e9) / (elapsed_ms / 1000.0))
}

/// Run `kernel` once over `grid` and time it.
///
/// The caller fills `buffers.arena` beforehand and supplies the kernel's
/// declared `total_ops`. The result buffer is never read back.
///
/// # Errors
///
/// - [`InstructionRateError::Measurement`] if `total_ops` is zero (nothing
///   would be measured) or the elapsed time is zero.
/// - [`InstructionRateError::Submission`] if the dispatch is rejected.
/// - [`InstructionRateError::Completion`] if a transfer or the dispatch
///   does not complete.
pub fn run_rate_test<B: ComputeBackend>(
    backend: &B,
    kernel: &mut B::Kernel,
    buffers: &mut RunBuffers<B>,
    grid: DispatchGrid,
    iterations: u32,
    total_ops: u64,
) -> Result<Measurement, InstructionRateError> {
    if total_ops == 0 {
        return Err(InstructionRateError::Measurement(format!(
            "zero operations to time ({iterations} iterations over {} work-items)",
            grid.global
        )));
    }

    buffers.host_result.fill(0);
    backend.upload(&buffers.device_input, buffers.arena.as_bytes())?;
    backend.upload(
        &buffers.device_result,
        bytemuck::cast_slice(&buffers.host_result),
    )?;
    backend.bind(
        kernel,
        KernelArgs {
            input: &buffers.device_input,
            iterations,
            result: &buffers.device_result,
            grid,
        },
    )?;
    backend.finish()?;

    let t0 = Instant::now();
    backend.enqueue(kernel, grid)?;
    backend.finish()?;
    let elapsed = t0.elapsed();

    let rate = giga_ops_per_second(total_ops, elapsed)?;
    debug!(
        iterations,
        threads = grid.global,
        total_ops,
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        rate,
        "dispatch timed"
    );
    Ok(Measurement {
        elapsed,
        giga_ops_per_second: rate,
    })
}
