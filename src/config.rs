// SPDX-License-Identifier: AGPL-3.0-only

//! Harness parameters.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `INSTRATE_THREADS` | 1048576 | total work-items per dispatch |
//! | `INSTRATE_LOCAL_SIZE` | 256 | work-items per workgroup |
//! | `INSTRATE_ITERATIONS` | 2048 | chase iterations per work-item |
//! | `INSTRATE_FORMAT` | `text` | `text` (stderr) or `json` (stdout) |

use serde::{Deserialize, Serialize};

use crate::error::InstructionRateError;

/// Lanes per vector element in every kernel.
pub const VECTOR_WIDTH: u32 = 4;

pub const DEFAULT_THREADS: u32 = 1_048_576;
pub const DEFAULT_LOCAL_SIZE: u32 = 256;
pub const DEFAULT_ITERATIONS: u32 = 2048;

/// Immutable parameters for one harness invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub thread_count: u32,
    pub local_group_size: u32,
    pub chase_iterations: u32,
    /// `local_group_size * VECTOR_WIDTH`.
    pub element_count: u32,
}

impl TestConfiguration {
    /// Validate and derive `element_count`.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::InvalidConfig`] if any value is zero,
    /// or `thread_count` is not a multiple of `local_group_size`.
    pub fn new(
        thread_count: u32,
        local_group_size: u32,
        chase_iterations: u32,
    ) -> Result<Self, InstructionRateError> {
        if thread_count == 0 || local_group_size == 0 || chase_iterations == 0 {
            return Err(InstructionRateError::InvalidConfig(format!(
                "thread_count ({thread_count}), local_group_size ({local_group_size}) and \
                 chase_iterations ({chase_iterations}) must all be positive"
            )));
        }
        if thread_count % local_group_size != 0 {
            return Err(InstructionRateError::InvalidConfig(format!(
                "thread_count ({thread_count}) is not a multiple of local_group_size ({local_group_size})"
            )));
        }
        let element_count = local_group_size.checked_mul(VECTOR_WIDTH).ok_or_else(|| {
            InstructionRateError::InvalidConfig(format!(
                "local_group_size ({local_group_size}) overflows the element count"
            ))
        })?;
        Ok(Self {
            thread_count,
            local_group_size,
            chase_iterations,
            element_count,
        })
    }

    /// Read `INSTRATE_THREADS` / `INSTRATE_LOCAL_SIZE` / `INSTRATE_ITERATIONS`.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionRateError::InvalidConfig`] if a variable is set
    /// but not a positive integer, or the combination is invalid.
    pub fn from_env() -> Result<Self, InstructionRateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, InstructionRateError> {
        let read = |key: &str, default: u32| -> Result<u32, InstructionRateError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                    InstructionRateError::InvalidConfig(format!("{key}={raw:?}: {e}"))
                }),
            }
        };
        Self::new(
            read("INSTRATE_THREADS", DEFAULT_THREADS)?,
            read("INSTRATE_LOCAL_SIZE", DEFAULT_LOCAL_SIZE)?,
            read("INSTRATE_ITERATIONS", DEFAULT_ITERATIONS)?,
        )
    }

    /// Number of workgroups in the 1-D dispatch grid.
    #[must_use]
    pub const fn workgroup_count(&self) -> u32 {
        self.thread_count / self.local_group_size
    }

    /// 32-bit slots in the host arena and device input buffer.
    #[must_use]
    pub const fn arena_words(&self) -> usize {
        self.element_count as usize * VECTOR_WIDTH as usize
    }

    /// 32-bit slots in the host result array and device result buffer.
    #[must_use]
    pub const fn result_words(&self) -> usize {
        self.thread_count as usize * VECTOR_WIDTH as usize
    }
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREADS,
            local_group_size: DEFAULT_LOCAL_SIZE,
            chase_iterations: DEFAULT_ITERATIONS,
            element_count: DEFAULT_LOCAL_SIZE * VECTOR_WIDTH,
        }
    }
}

/// How sub-test results are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// `"<rate> G <LABEL> Adds/sec"` lines on the diagnostic stream.
    #[default]
    Text,
    /// One JSON object per sub-test on standard output.
    Json,
}

impl ReportFormat {
    /// Read `INSTRATE_FORMAT`; anything other than `json` is text.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("INSTRATE_FORMAT").as_deref() {
            Ok(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn element_count_is_four_lanes_per_work_item() {
        let cfg = TestConfiguration::new(256, 64, 1000).unwrap();
        assert_eq!(cfg.element_count, 256);
        assert_eq!(cfg.arena_words(), 1024);
        assert_eq!(cfg.result_words(), 1024);
        assert_eq!(cfg.workgroup_count(), 4);
    }

    #[test]
    fn rejects_ragged_grid() {
        let err = TestConfiguration::new(250, 64, 1000).unwrap_err();
        assert!(matches!(err, InstructionRateError::InvalidConfig(_)));
        assert!(err.to_string().contains("multiple"));
    }

    #[test]
    fn rejects_zero_values() {
        assert!(TestConfiguration::new(0, 64, 10).is_err());
        assert!(TestConfiguration::new(64, 0, 10).is_err());
        assert!(TestConfiguration::new(64, 64, 0).is_err());
    }

    #[test]
    fn small_iteration_counts_are_accepted() {
        let cfg = TestConfiguration::new(64, 64, 3).unwrap();
        assert_eq!(cfg.chase_iterations, 3);
    }

    #[test]
    fn lookup_defaults_when_unset() {
        let cfg = TestConfiguration::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, TestConfiguration::default());
    }

    #[test]
    fn lookup_reads_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INSTRATE_THREADS", "4096"),
            ("INSTRATE_LOCAL_SIZE", " 128 "),
            ("INSTRATE_ITERATIONS", "77"),
        ]
        .into_iter()
        .collect();
        let cfg =
            TestConfiguration::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.thread_count, 4096);
        assert_eq!(cfg.local_group_size, 128);
        assert_eq!(cfg.chase_iterations, 77);
        assert_eq!(cfg.element_count, 512);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = TestConfiguration::from_lookup(|k| {
            (k == "INSTRATE_ITERATIONS").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("INSTRATE_ITERATIONS"));
    }

    #[test]
    fn serializes_to_json() {
        let cfg = TestConfiguration::new(256, 64, 1000).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"thread_count\":256"));
        let back: TestConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
