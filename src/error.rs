// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for the instruction-rate harness.
//!
//! Callers pattern-match on the failure mode: allocation failures abort the
//! whole run, while submission, completion, measurement and kernel-build
//! failures are local to one sub-test and turn into a zero rate.

use std::fmt;

/// Errors arising from device bring-up, buffer setup, or a timed dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionRateError {
    /// No compatible GPU adapter was found by wgpu.
    NoAdapter,

    /// GPU device creation failed (wraps the underlying wgpu error message).
    DeviceCreation(String),

    /// Harness parameters were rejected before any work was done.
    InvalidConfig(String),

    /// Host or device buffer allocation failed. Fatal for the run.
    Allocation { what: &'static str, bytes: u64 },

    /// Kernel source failed to compile or the pipeline was rejected.
    KernelBuild { kernel: &'static str, reason: String },

    /// The device rejected the kernel dispatch.
    Submission(String),

    /// The device reported an error while we waited for completion.
    Completion(String),

    /// The elapsed time or operation count cannot produce a rate.
    Measurement(String),

    /// Writing a result line failed.
    Io(String),
}

impl InstructionRateError {
    /// Whether this failure ends the whole run rather than one sub-test.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoAdapter
                | Self::DeviceCreation(_)
                | Self::InvalidConfig(_)
                | Self::Allocation { .. }
                | Self::Io(_)
        )
    }
}

impl fmt::Display for InstructionRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "No GPU adapter found"),
            Self::DeviceCreation(e) => write!(f, "Failed to create GPU device: {e}"),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Allocation { what, bytes } => {
                write!(f, "Failed to allocate {bytes} bytes for {what}")
            }
            Self::KernelBuild { kernel, reason } => {
                write!(f, "Failed to build kernel {kernel}: {reason}")
            }
            Self::Submission(status) => {
                write!(f, "Failed to submit kernel to command queue: {status}")
            }
            Self::Completion(status) => write!(f, "Failed to finish command queue: {status}"),
            Self::Measurement(msg) => write!(f, "Unusable measurement: {msg}"),
            Self::Io(msg) => write!(f, "Failed to write result: {msg}"),
        }
    }
}

impl std::error::Error for InstructionRateError {}

impl From<std::io::Error> for InstructionRateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
