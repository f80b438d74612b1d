// SPDX-License-Identifier: AGPL-3.0-only

//! Sub-test sequencing.
//!
//! int32 → fp32 → mixed → int64 → fp64 (if the device has f64). Every
//! sub-test reuses the same host arena and device buffers. A failure in one
//! sub-test is logged, reported as a zero rate, and the next one runs. Only
//! buffer allocation at the start is fatal.

use std::io::Write;

use tracing::{error, info, warn};

use crate::backend::{ComputeBackend, DispatchGrid};
use crate::config::{ReportFormat, TestConfiguration};
use crate::error::InstructionRateError;
use crate::kernels::{KernelDescriptor, SEQUENCE};
use crate::report::{self, HarnessStatus, RateResult, SubTestOutcome};
use crate::runner::{run_rate_test, RunBuffers};

/// Run every sub-test and write `"<rate> G <LABEL> Adds/sec"` lines to the
/// process's diagnostic stream (stderr).
///
/// # Errors
///
/// Returns [`InstructionRateError::Allocation`] if the shared buffers
/// cannot be created, or [`InstructionRateError::Io`] if stderr is closed.
pub fn instruction_rate_test<B: ComputeBackend>(
    backend: &B,
    config: &TestConfiguration,
) -> Result<HarnessStatus, InstructionRateError> {
    let mut stderr = std::io::stderr().lock();
    run_harness(backend, config, ReportFormat::Text, &mut stderr)
}

/// Run every sub-test, writing one outcome per sub-test to `sink`.
///
/// # Errors
///
/// See [`instruction_rate_test`].
pub fn run_harness<B: ComputeBackend>(
    backend: &B,
    config: &TestConfiguration,
    format: ReportFormat,
    sink: &mut dyn Write,
) -> Result<HarnessStatus, InstructionRateError> {
    let mut buffers = RunBuffers::allocate(backend, config).map_err(|e| {
        error!(error = %e, "Failed to allocate memory for instruction rate test");
        e
    })?;
    let grid = DispatchGrid::new(config.thread_count, config.local_group_size);

    let mut status = HarnessStatus::default();
    for descriptor in SEQUENCE {
        let outcome = run_sub_test(backend, config, descriptor, &mut buffers, grid);
        report::emit(sink, format, &outcome)?;
        status.record(&outcome);
    }

    if let Err(e) = backend.finish() {
        warn!(error = %e, "final queue drain failed");
    }
    info!(
        measured = status.measured,
        failed = status.failed,
        unsupported = status.unsupported,
        "instruction rate test complete"
    );
    Ok(status)
}

/// One state of the sequence. Never fails: errors become a zero rate.
pub fn run_sub_test<B: ComputeBackend>(
    backend: &B,
    config: &TestConfiguration,
    descriptor: &KernelDescriptor,
    buffers: &mut RunBuffers<B>,
    grid: DispatchGrid,
) -> SubTestOutcome {
    if let Some(capability) = descriptor.requires {
        if !backend.supports(capability) {
            info!(label = descriptor.label, %capability, "capability absent, skipping");
            return SubTestOutcome::Unsupported {
                label: descriptor.label,
            };
        }
    }

    let iterations = descriptor.iterations(config);
    let total_ops = descriptor.total_ops(config);
    buffers.arena.fill(descriptor.operand);

    let measured = backend
        .build_kernel(descriptor, config.local_group_size)
        .and_then(|mut kernel| {
            run_rate_test(backend, &mut kernel, buffers, grid, iterations, total_ops)
        });

    let (giga_ops_per_second, error) = match measured {
        Ok(m) => (m.giga_ops_per_second, None),
        Err(e) => {
            warn!(
                label = descriptor.label,
                kernel = descriptor.name,
                error = %e,
                "sub-test failed, reporting 0"
            );
            (0.0, Some(e.to_string()))
        }
    };

    SubTestOutcome::Measured(RateResult {
        label: descriptor.label,
        kernel: descriptor.name,
        operand: descriptor.operand,
        iterations,
        total_ops,
        giga_ops_per_second,
        error,
    })
}
