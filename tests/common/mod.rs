// SPDX-License-Identifier: AGPL-3.0-only

//! Recording backend: logs every call, injects failures on request.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::time::Duration;

use gpu_instruction_rate::backend::{ComputeBackend, DispatchGrid, KernelArgs};
use gpu_instruction_rate::capability::{Capability, CapabilityProbe};
use gpu_instruction_rate::config::ReportFormat;
use gpu_instruction_rate::kernels::KernelDescriptor;
use gpu_instruction_rate::{run_harness, HarnessStatus, InstructionRateError, TestConfiguration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateBuffer { label: &'static str, size: u64 },
    Build { kernel: &'static str, local: u32 },
    Upload { buffer: &'static str, bytes: Vec<u8> },
    Bind { kernel: &'static str, iterations: u32, threads: u32 },
    Enqueue { kernel: &'static str, workgroups: u32 },
    Finish,
}

#[derive(Debug)]
pub struct MockBuffer {
    pub label: &'static str,
}

#[derive(Debug)]
pub struct MockKernel {
    pub name: &'static str,
    pub bound: bool,
}

pub struct RecordingBackend {
    pub calls: RefCell<Vec<Call>>,
    pub capabilities: Vec<Capability>,
    pub reject_dispatch: Vec<&'static str>,
    pub fail_completion: Vec<&'static str>,
    pub fail_build: Vec<&'static str>,
    pub fail_allocation: bool,
    pub dispatch_time: Duration,
    in_flight: Cell<Option<&'static str>>,
}

impl RecordingBackend {
    /// Device with fp64, no native int64, and 1 ms per dispatch.
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            capabilities: vec![Capability::Fp64],
            reject_dispatch: Vec::new(),
            fail_completion: Vec::new(),
            fail_build: Vec::new(),
            fail_allocation: false,
            dispatch_time: Duration::from_millis(1),
            in_flight: Cell::new(None),
        }
    }

    pub fn without_fp64() -> Self {
        Self {
            capabilities: Vec::new(),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn built(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Build { kernel, .. } => Some(kernel),
                _ => None,
            })
            .collect()
    }

    pub fn enqueued(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Enqueue { kernel, .. } => Some(kernel),
                _ => None,
            })
            .collect()
    }

    pub fn bound_iterations(&self, kernel: &str) -> Option<u32> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Bind {
                kernel: k,
                iterations,
                ..
            } if k == kernel => Some(iterations),
            _ => None,
        })
    }

    /// Bytes uploaded to the input buffer, one entry per dispatch.
    pub fn input_uploads(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload {
                    buffer: "rate_input",
                    bytes,
                } => Some(bytes),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl CapabilityProbe for RecordingBackend {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl ComputeBackend for RecordingBackend {
    type Buffer = MockBuffer;
    type Kernel = MockKernel;

    fn create_buffer(
        &self,
        label: &'static str,
        size_bytes: u64,
    ) -> Result<MockBuffer, InstructionRateError> {
        self.record(Call::CreateBuffer {
            label,
            size: size_bytes,
        });
        if self.fail_allocation {
            return Err(InstructionRateError::Allocation {
                what: label,
                bytes: size_bytes,
            });
        }
        Ok(MockBuffer { label })
    }

    fn build_kernel(
        &self,
        descriptor: &KernelDescriptor,
        local_group_size: u32,
    ) -> Result<MockKernel, InstructionRateError> {
        self.record(Call::Build {
            kernel: descriptor.name,
            local: local_group_size,
        });
        if self.fail_build.contains(&descriptor.name) {
            return Err(InstructionRateError::KernelBuild {
                kernel: descriptor.name,
                reason: "shader compilation failed".into(),
            });
        }
        Ok(MockKernel {
            name: descriptor.name,
            bound: false,
        })
    }

    fn upload(&self, buffer: &MockBuffer, bytes: &[u8]) -> Result<(), InstructionRateError> {
        self.record(Call::Upload {
            buffer: buffer.label,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn bind(
        &self,
        kernel: &mut MockKernel,
        args: KernelArgs<'_, MockBuffer>,
    ) -> Result<(), InstructionRateError> {
        assert_eq!(args.input.label, "rate_input");
        assert_eq!(args.result.label, "rate_result");
        kernel.bound = true;
        self.record(Call::Bind {
            kernel: kernel.name,
            iterations: args.iterations,
            threads: args.grid.global,
        });
        Ok(())
    }

    fn enqueue(&self, kernel: &MockKernel, grid: DispatchGrid) -> Result<(), InstructionRateError> {
        assert!(kernel.bound, "{} enqueued before bind", kernel.name);
        self.record(Call::Enqueue {
            kernel: kernel.name,
            workgroups: grid.workgroups(),
        });
        if self.reject_dispatch.contains(&kernel.name) {
            return Err(InstructionRateError::Submission(
                "Validation Error: dispatch rejected (-54)".into(),
            ));
        }
        self.in_flight.set(Some(kernel.name));
        Ok(())
    }

    fn finish(&self) -> Result<(), InstructionRateError> {
        self.record(Call::Finish);
        if let Some(name) = self.in_flight.take() {
            std::thread::sleep(self.dispatch_time);
            if self.fail_completion.contains(&name) {
                return Err(InstructionRateError::Completion("device lost (-5)".into()));
            }
        }
        Ok(())
    }
}

/// Run the harness in text mode and return its status and output lines.
pub fn run_text(
    backend: &RecordingBackend,
    config: &TestConfiguration,
) -> (Result<HarnessStatus, InstructionRateError>, Vec<String>) {
    let mut out = Vec::new();
    let status = run_harness(backend, config, ReportFormat::Text, &mut out);
    let text = String::from_utf8(out).unwrap();
    (status, text.lines().map(str::to_string).collect())
}

/// Leading rate of a `"<rate> G <LABEL> Adds/sec"` line.
pub fn rate_of(line: &str) -> f64 {
    line.split(' ').next().unwrap().parse().unwrap()
}

pub fn scenario() -> TestConfiguration {
    TestConfiguration::new(256, 64, 1000).unwrap()
}
