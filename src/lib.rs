// SPDX-License-Identifier: AGPL-3.0-only

#![deny(clippy::expect_used, clippy::unwrap_used)]

//! GPU instruction-rate micro-benchmark.
//!
//! Measures raw arithmetic throughput of a compute device per operand type
//! (int32, fp32, mixed fp32/int32, int64 and, when the device has it, fp64)
//! by timing one dispatch of a dependent-add WGSL kernel per type.
//!
//! ## Modules
//!   - `capability`: optional numeric capabilities (`SHADER_F64`, `SHADER_INT64`)
//!   - `workload`: host arena and deterministic fill patterns
//!   - `kernels`: kernel catalogue with declared operation counts
//!   - `backend`: device seam the harness is generic over
//!   - `runner`: one timed dispatch and the rate it implies
//!   - `orchestrator`: sub-test sequencing and result lines
//!   - `gpu`: wgpu implementation of the backend
//!
//! ## Binary
//!   - `instruction_rate`: run the harness on the selected GPU

pub mod backend;
pub mod capability;
pub mod config;
pub mod error;
pub mod gpu;
pub mod kernels;
pub mod logging;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod workload;

pub use config::{ReportFormat, TestConfiguration};
pub use error::InstructionRateError;
pub use orchestrator::{instruction_rate_test, run_harness};
pub use report::{HarnessStatus, RateResult, SubTestOutcome};
