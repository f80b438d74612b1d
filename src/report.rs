// SPDX-License-Identifier: AGPL-3.0-only

//! Result lines and their JSON form.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::config::ReportFormat;
use crate::error::InstructionRateError;
use crate::workload::OperandKind;

/// Throughput of one sub-test. Emitted, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateResult {
    pub label: &'static str,
    pub kernel: &'static str,
    pub operand: OperandKind,
    pub iterations: u32,
    pub total_ops: u64,
    /// Zero when `error` is set.
    pub giga_ops_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What one sub-test produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubTestOutcome {
    Measured(RateResult),
    Unsupported { label: &'static str },
}

impl fmt::Display for SubTestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(r) => write!(f, "{:.6} G {} Adds/sec", r.giga_ops_per_second, r.label),
            Self::Unsupported { label } => write!(f, "{label} not supported"),
        }
    }
}

/// Tally returned by the harness entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarnessStatus {
    /// Sub-tests that produced a non-zero rate.
    pub measured: usize,
    /// Sub-tests that ran but reported zero after a failure.
    pub failed: usize,
    /// Sub-tests skipped for a missing capability.
    pub unsupported: usize,
}

impl HarnessStatus {
    pub fn record(&mut self, outcome: &SubTestOutcome) {
        match outcome {
            SubTestOutcome::Measured(r) if r.error.is_none() => self.measured += 1,
            SubTestOutcome::Measured(_) => self.failed += 1,
            SubTestOutcome::Unsupported { .. } => self.unsupported += 1,
        }
    }

    /// True when no sub-test failed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Write one outcome to `sink` in `format`.
///
/// # Errors
///
/// Returns [`InstructionRateError::Io`] if the write fails.
pub fn emit(
    sink: &mut dyn Write,
    format: ReportFormat,
    outcome: &SubTestOutcome,
) -> Result<(), InstructionRateError> {
    match format {
        ReportFormat::Text => writeln!(sink, "{outcome}")?,
        ReportFormat::Json => {
            let line = serde_json::to_string(outcome)
                .map_err(|e| InstructionRateError::Io(e.to_string()))?;
            writeln!(sink, "{line}")?;
        }
    }
    sink.flush()?;
    Ok(())
}
