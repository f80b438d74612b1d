// SPDX-License-Identifier: AGPL-3.0-only

//! Host workload arena and deterministic fill patterns.
//!
//! One arena lives for the whole run. Each sub-test re-views the same
//! storage as the element type its kernel reads (u32, f32, u64 or f64) and
//! overwrites it completely before dispatch. The backing store is `u64`
//! so every view is aligned.

use serde::Serialize;

use crate::config::TestConfiguration;
use crate::error::InstructionRateError;

/// Element type a kernel reads from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    Int32,
    Fp32,
    /// fp32 and int32 lanes over the same bytes; filled like [`Self::Fp32`].
    MixedFp32Int32,
    Int64,
    Fp64,
}

/// Typed, mutable view of the arena for one operand kind.
pub enum WorkloadView<'a> {
    U32(&'a mut [u32]),
    F32(&'a mut [f32]),
    U64(&'a mut [u64]),
    F64(&'a mut [f64]),
}

/// Host-owned raw storage reused across sub-tests.
#[derive(Debug)]
pub struct WorkloadArena {
    storage: Vec<u64>,
}

impl WorkloadArena {
    /// Allocate a zeroed arena of `words32` 32-bit slots (rounded up to a
    /// whole number of 64-bit slots).
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::Allocation`] if the host allocation
    /// fails.
    pub fn new(words32: usize) -> Result<Self, InstructionRateError> {
        let words64 = words32.div_ceil(2);
        Ok(Self {
            storage: try_zeroed(words64, "workload arena")?,
        })
    }

    /// Arena sized for a configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn for_config(config: &TestConfiguration) -> Result<Self, InstructionRateError> {
        Self::new(config.arena_words())
    }

    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.storage.len() * 8
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.storage)
    }

    /// View the arena as the element type of `kind`.
    pub fn view(&mut self, kind: OperandKind) -> WorkloadView<'_> {
        match kind {
            OperandKind::Int32 => WorkloadView::U32(bytemuck::cast_slice_mut(&mut self.storage)),
            OperandKind::Fp32 | OperandKind::MixedFp32Int32 => {
                WorkloadView::F32(bytemuck::cast_slice_mut(&mut self.storage))
            }
            OperandKind::Int64 => WorkloadView::U64(&mut self.storage),
            OperandKind::Fp64 => WorkloadView::F64(bytemuck::cast_slice_mut(&mut self.storage)),
        }
    }

    /// Overwrite the whole arena with the pattern for `kind`.
    pub fn fill(&mut self, kind: OperandKind) {
        match self.view(kind) {
            WorkloadView::U32(slots) => {
                for (i, v) in slots.iter_mut().enumerate() {
                    *v = (i as u32).wrapping_add(1);
                }
            }
            WorkloadView::F32(slots) => {
                for (i, v) in slots.iter_mut().enumerate() {
                    *v = 0.5 * i as f32;
                }
            }
            WorkloadView::U64(slots) => {
                for (i, v) in slots.iter_mut().enumerate() {
                    *v = i as u64 * 2;
                }
            }
            WorkloadView::F64(slots) => {
                for (i, v) in slots.iter_mut().enumerate() {
                    *v = 0.5 * i as f64;
                }
            }
        }
    }
}

/// Zeroed vector whose allocation failure is reported instead of aborting.
pub(crate) fn try_zeroed<T: Copy + Default>(
    len: usize,
    what: &'static str,
) -> Result<Vec<T>, InstructionRateError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| InstructionRateError::Allocation {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<T>()) as u64,
        })?;
    v.resize(len, T::default());
    Ok(v)
}
