// SPDX-License-Identifier: AGPL-3.0-only

//! Optional numeric capabilities a device may lack.
//!
//! Code asks "can you do f64?", never "are you an RTX 4070?".

use std::fmt;
use std::str::FromStr;

/// An optional shader capability probed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// IEEE 754 f64 arithmetic in compute shaders (`SHADER_F64`).
    Fp64,
    /// Native 64-bit integers in compute shaders (`SHADER_INT64`).
    Int64,
}

impl Capability {
    /// Short label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fp64 => "fp64",
            Self::Int64 => "int64",
        }
    }

    /// The wgpu feature that provides this capability.
    #[must_use]
    pub const fn wgpu_feature(self) -> wgpu::Features {
        match self {
            Self::Fp64 => wgpu::Features::SHADER_F64,
            Self::Int64 => wgpu::Features::SHADER_INT64,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fp64" | "f64" | "shader_f64" | "cl_khr_fp64" => Ok(Self::Fp64),
            "int64" | "i64" | "u64" | "shader_int64" | "cl_khr_int64" => Ok(Self::Int64),
            other => Err(format!("unknown capability '{other}'")),
        }
    }
}

/// Answers capability queries against one device.
pub trait CapabilityProbe {
    /// Pure query; no side effects.
    fn supports(&self, capability: Capability) -> bool;

    /// Query by name. Names that do not parse are unsupported.
    fn supports_named(&self, name: &str) -> bool {
        name.parse::<Capability>()
            .is_ok_and(|capability| self.supports(capability))
    }
}

/// Capabilities enabled by a set of wgpu device features.
#[must_use]
pub fn supported_by(features: wgpu::Features, capability: Capability) -> bool {
    features.contains(capability.wgpu_feature())
}
