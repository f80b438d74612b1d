// SPDX-License-Identifier: AGPL-3.0-only

//! Kernel catalogue.
//!
//! Each sub-test's operation count is declared here, next to the WGSL body
//! it describes. Editing a shader loop without updating its
//! [`OpsFormula`] silently skews the reported rate, so keep them together.
//!
//! | Kernel | Iterations | Ops / work-item / iteration |
//! |--------|-----------|------------------------------|
//! | `int32_add_rate_test` | chase | 4×8 + 1 (loop increment) |
//! | `fp32_add_rate_test` | chase | 4×8 |
//! | `mix_fp32_int32_add_rate_test` | chase | 4×8 + 1 |
//! | `int64_add_rate_test` | chase / 2 | 2×8 |
//! | `fp64_add_rate_test` | chase / 4 | 2×8 |

use crate::capability::Capability;
use crate::config::TestConfiguration;
use crate::workload::OperandKind;

const INT32_ADD_SHADER: &str = include_str!("shaders/int32_add_rate.wgsl");
const FP32_ADD_SHADER: &str = include_str!("shaders/fp32_add_rate.wgsl");
const MIX_ADD_SHADER: &str = include_str!("shaders/mix_fp32_int32_add_rate.wgsl");
const INT64_ADD_SHADER: &str = include_str!("shaders/int64_add_rate.wgsl");
const INT64_ADD_SHADER_U32X2: &str = include_str!("shaders/int64_add_rate_u32x2.wgsl");
const FP64_ADD_SHADER: &str = include_str!("shaders/fp64_add_rate.wgsl");

/// Placeholder for the workgroup size in every shader body.
const WG_SIZE_TOKEN: &str = "{{WG_SIZE}}";

/// Arithmetic operations one kernel performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpsFormula {
    /// Operations per work-item per loop iteration.
    pub ops_per_iteration: u32,
    /// The kernel runs `chase_iterations / iteration_divisor` iterations.
    pub iteration_divisor: u32,
}

impl OpsFormula {
    /// `lanes * adds` per iteration, plus one if the loop increment counts.
    #[must_use]
    pub const fn adds(lanes: u32, adds: u32, count_loop_increment: bool) -> Self {
        Self {
            ops_per_iteration: lanes * adds + if count_loop_increment { 1 } else { 0 },
            iteration_divisor: 1,
        }
    }

    /// Run this kernel at a fraction of the configured chase iterations.
    #[must_use]
    pub const fn reduced(mut self, divisor: u32) -> Self {
        self.iteration_divisor = divisor;
        self
    }

    /// Iteration count this kernel is dispatched with (truncating).
    #[must_use]
    pub const fn iterations(&self, chase_iterations: u32) -> u32 {
        chase_iterations / self.iteration_divisor
    }

    /// Total operations across the dispatch.
    #[must_use]
    pub const fn total_ops(&self, config: &TestConfiguration) -> u64 {
        self.iterations(config.chase_iterations) as u64
            * self.ops_per_iteration as u64
            * config.thread_count as u64
    }
}

/// Static description of one sub-test kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelDescriptor {
    /// WGSL pipeline label and the entry name used in logs.
    pub name: &'static str,
    /// Label in the result line, e.g. `"INT32"`.
    pub label: &'static str,
    pub operand: OperandKind,
    pub ops: OpsFormula,
    /// If set, the sub-test is skipped on devices without it.
    pub requires: Option<Capability>,
    /// Portable WGSL body.
    pub source: &'static str,
    /// Faster body used when the device has the capability.
    pub native: Option<(Capability, &'static str)>,
}

pub const INT32_ADD: KernelDescriptor = KernelDescriptor {
    name: "int32_add_rate_test",
    label: "INT32",
    operand: OperandKind::Int32,
    ops: OpsFormula::adds(4, 8, true),
    requires: None,
    source: INT32_ADD_SHADER,
    native: None,
};

// Loop increment not counted.
pub const FP32_ADD: KernelDescriptor = KernelDescriptor {
    name: "fp32_add_rate_test",
    label: "FP32",
    operand: OperandKind::Fp32,
    ops: OpsFormula::adds(4, 8, false),
    requires: None,
    source: FP32_ADD_SHADER,
    native: None,
};

pub const MIX_FP32_INT32_ADD: KernelDescriptor = KernelDescriptor {
    name: "mix_fp32_int32_add_rate_test",
    label: "mixed INT32 and FP32",
    operand: OperandKind::MixedFp32Int32,
    ops: OpsFormula::adds(4, 8, true),
    requires: None,
    source: MIX_ADD_SHADER,
    native: None,
};

pub const INT64_ADD: KernelDescriptor = KernelDescriptor {
    name: "int64_add_rate_test",
    label: "INT64",
    operand: OperandKind::Int64,
    ops: OpsFormula::adds(2, 8, false).reduced(2),
    requires: None,
    source: INT64_ADD_SHADER_U32X2,
    native: Some((Capability::Int64, INT64_ADD_SHADER)),
};

pub const FP64_ADD: KernelDescriptor = KernelDescriptor {
    name: "fp64_add_rate_test",
    label: "FP64",
    operand: OperandKind::Fp64,
    ops: OpsFormula::adds(2, 8, false).reduced(4),
    requires: Some(Capability::Fp64),
    source: FP64_ADD_SHADER,
    native: None,
};

/// Sub-tests in the order the harness runs them.
pub const SEQUENCE: [&KernelDescriptor; 5] =
    [&INT32_ADD, &FP32_ADD, &MIX_FP32_INT32_ADD, &INT64_ADD, &FP64_ADD];

impl KernelDescriptor {
    /// Iterations for this kernel under `config`.
    #[must_use]
    pub const fn iterations(&self, config: &TestConfiguration) -> u32 {
        self.ops.iterations(config.chase_iterations)
    }

    /// Total operations for this kernel under `config`.
    #[must_use]
    pub const fn total_ops(&self, config: &TestConfiguration) -> u64 {
        self.ops.total_ops(config)
    }

    /// Pick the WGSL body and substitute the workgroup size.
    #[must_use]
    pub fn render_source(
        &self,
        local_group_size: u32,
        supports: impl Fn(Capability) -> bool,
    ) -> String {
        let body = match self.native {
            Some((capability, native)) if supports(capability) => native,
            _ => self.source,
        };
        body.replace(WG_SIZE_TOKEN, &local_group_size.to_string())
    }
}
