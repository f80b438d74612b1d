// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: full sub-test sequence against a recording backend.
//!
//! Validates result lines, capability gating, failure isolation, iteration
//! reduction, and the upload → bind → drain → dispatch → drain protocol.

mod common;

use common::{rate_of, run_text, scenario, Call, RecordingBackend};
use gpu_instruction_rate::config::ReportFormat;
use gpu_instruction_rate::{
    instruction_rate_test, run_harness, HarnessStatus, InstructionRateError, TestConfiguration,
};

const LABELS: [&str; 5] = [
    "INT32",
    "FP32",
    "mixed INT32 and FP32",
    "INT64",
    "FP64",
];

#[test]
fn scenario_a_five_positive_rates() {
    let backend = RecordingBackend::new();
    let (status, lines) = run_text(&backend, &scenario());

    assert_eq!(
        status.unwrap(),
        HarnessStatus {
            measured: 5,
            failed: 0,
            unsupported: 0
        }
    );
    assert_eq!(lines.len(), 5);
    for (line, label) in lines.iter().zip(LABELS) {
        assert!(
            line.ends_with(&format!(" G {label} Adds/sec")),
            "unexpected line {line:?}"
        );
        assert!(rate_of(line) > 0.0, "{line}");
    }
}

#[test]
fn scenario_b_fp64_unsupported() {
    let backend = RecordingBackend::without_fp64();
    let (status, lines) = run_text(&backend, &scenario());

    assert_eq!(status.unwrap().unsupported, 1);
    assert_eq!(lines.len(), 5);
    for (line, label) in lines.iter().take(4).zip(LABELS) {
        assert!(line.ends_with(&format!(" G {label} Adds/sec")));
    }
    assert_eq!(lines[4], "FP64 not supported");
    assert!(!backend.built().contains(&"fp64_add_rate_test"));
    assert!(!backend.enqueued().contains(&"fp64_add_rate_test"));
}

#[test]
fn scenario_c_rejected_fp32_dispatch_is_isolated() {
    let mut backend = RecordingBackend::new();
    backend.reject_dispatch = vec!["fp32_add_rate_test"];
    let (status, lines) = run_text(&backend, &scenario());

    let status = status.unwrap();
    assert_eq!(status.failed, 1);
    assert_eq!(status.measured, 4);
    assert_eq!(lines[1], "0.000000 G FP32 Adds/sec");
    assert!(rate_of(&lines[3]) > 0.0, "int64 still runs");
    assert!(rate_of(&lines[4]) > 0.0, "fp64 still runs");
    assert_eq!(
        backend.enqueued(),
        [
            "int32_add_rate_test",
            "fp32_add_rate_test",
            "mix_fp32_int32_add_rate_test",
            "int64_add_rate_test",
            "fp64_add_rate_test",
        ]
    );
}

#[test]
fn completion_failure_reports_zero_and_continues() {
    let mut backend = RecordingBackend::new();
    backend.fail_completion = vec!["mix_fp32_int32_add_rate_test"];
    let (status, lines) = run_text(&backend, &scenario());

    assert_eq!(status.unwrap().failed, 1);
    assert_eq!(lines[2], "0.000000 G mixed INT32 and FP32 Adds/sec");
    assert!(rate_of(&lines[3]) > 0.0);
}

#[test]
fn kernel_build_failure_reports_zero_and_continues() {
    let mut backend = RecordingBackend::new();
    backend.fail_build = vec!["int64_add_rate_test"];
    let (status, lines) = run_text(&backend, &scenario());

    assert_eq!(status.unwrap().failed, 1);
    assert_eq!(lines[3], "0.000000 G INT64 Adds/sec");
    assert!(!backend.enqueued().contains(&"int64_add_rate_test"));
    assert!(rate_of(&lines[4]) > 0.0);
}

#[test]
fn rate_is_zero_only_on_failure() {
    let mut backend = RecordingBackend::new();
    backend.reject_dispatch = vec!["int32_add_rate_test"];
    backend.fail_completion = vec!["fp64_add_rate_test"];
    let (_, lines) = run_text(&backend, &scenario());

    let zero: Vec<bool> = lines.iter().map(|l| rate_of(l) == 0.0).collect();
    assert_eq!(zero, [true, false, false, false, true]);
}

#[test]
fn reduced_iteration_counts() {
    let backend = RecordingBackend::new();
    let cfg = TestConfiguration::new(256, 64, 1001).unwrap();
    let _ = run_text(&backend, &cfg);

    assert_eq!(backend.bound_iterations("int32_add_rate_test"), Some(1001));
    assert_eq!(backend.bound_iterations("fp32_add_rate_test"), Some(1001));
    assert_eq!(
        backend.bound_iterations("mix_fp32_int32_add_rate_test"),
        Some(1001)
    );
    assert_eq!(backend.bound_iterations("int64_add_rate_test"), Some(500));
    assert_eq!(backend.bound_iterations("fp64_add_rate_test"), Some(250));
}

#[test]
fn fewer_than_four_iterations_is_attributable_measurement_error() {
    let backend = RecordingBackend::new();
    let cfg = TestConfiguration::new(256, 64, 3).unwrap();
    let mut out = Vec::new();
    let status = run_harness(&backend, &cfg, ReportFormat::Json, &mut out).unwrap();

    assert_eq!(status.failed, 1);
    assert!(!backend.enqueued().contains(&"fp64_add_rate_test"));

    let text = String::from_utf8(out).unwrap();
    let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["label"], "FP64");
    assert_eq!(last["operand"], "fp64");
    assert_eq!(last["iterations"], 0);
    assert_eq!(last["giga_ops_per_second"], 0.0);
    assert!(last["error"]
        .as_str()
        .unwrap()
        .contains("Unusable measurement"));
}

#[test]
fn every_dispatch_follows_the_protocol() {
    let backend = RecordingBackend::new();
    let _ = run_text(&backend, &scenario());

    let calls = backend.calls();
    let builds: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::Build { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(builds.len(), 5);

    for &b in &builds {
        let window = &calls[b + 1..b + 7];
        assert!(matches!(&window[0], Call::Upload { buffer: "rate_input", .. }));
        match &window[1] {
            Call::Upload {
                buffer: "rate_result",
                bytes,
            } => {
                assert_eq!(bytes.len(), 256 * 16);
                assert!(bytes.iter().all(|&x| x == 0), "result not cleared");
            }
            other => panic!("expected result upload, got {other:?}"),
        }
        assert!(matches!(&window[2], Call::Bind { threads: 256, .. }));
        assert_eq!(window[3], Call::Finish);
        assert!(matches!(&window[4], Call::Enqueue { workgroups: 4, .. }));
        assert_eq!(window[5], Call::Finish);
    }
}

#[test]
fn buffers_allocated_once_per_run() {
    let backend = RecordingBackend::new();
    let _ = run_text(&backend, &scenario());

    let created: Vec<Call> = backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::CreateBuffer { .. }))
        .collect();
    assert_eq!(
        created,
        [
            Call::CreateBuffer {
                label: "rate_input",
                size: 256 * 4 * 4
            },
            Call::CreateBuffer {
                label: "rate_result",
                size: 256 * 4 * 4
            },
        ]
    );
}

#[test]
fn input_patterns_per_sub_test() {
    let backend = RecordingBackend::new();
    let _ = run_text(&backend, &scenario());
    let uploads = backend.input_uploads();
    assert_eq!(uploads.len(), 5);

    let u32_at = |b: &[u8], i: usize| u32::from_le_bytes(b[i * 4..i * 4 + 4].try_into().unwrap());
    let f32_at = |b: &[u8], i: usize| f32::from_le_bytes(b[i * 4..i * 4 + 4].try_into().unwrap());
    let u64_at = |b: &[u8], i: usize| u64::from_le_bytes(b[i * 8..i * 8 + 8].try_into().unwrap());
    let f64_at = |b: &[u8], i: usize| f64::from_le_bytes(b[i * 8..i * 8 + 8].try_into().unwrap());

    assert_eq!(u32_at(&uploads[0], 0), 1);
    assert_eq!(u32_at(&uploads[0], 1023), 1024);
    assert_eq!(f32_at(&uploads[1], 10), 5.0);
    assert_eq!(uploads[2], uploads[1], "mixed reuses the fp32 pattern");
    assert_eq!(u64_at(&uploads[3], 511), 1022);
    assert_eq!(f64_at(&uploads[4], 3), 1.5);
}

#[test]
fn input_bytes_deterministic_across_runs() {
    let first = RecordingBackend::new();
    let _ = run_text(&first, &scenario());

    let mut second = RecordingBackend::new();
    second.reject_dispatch = vec!["int32_add_rate_test"];
    let _ = run_text(&second, &scenario());

    assert_eq!(first.input_uploads(), second.input_uploads());
}

#[test]
fn allocation_failure_is_fatal() {
    let mut backend = RecordingBackend::new();
    backend.fail_allocation = true;
    let (status, lines) = run_text(&backend, &scenario());

    assert!(matches!(
        status,
        Err(InstructionRateError::Allocation {
            what: "rate_input",
            ..
        })
    ));
    assert!(lines.is_empty());
    assert!(backend.built().is_empty());
}

#[test]
fn local_size_passed_to_kernel_build() {
    let backend = RecordingBackend::new();
    let cfg = TestConfiguration::new(512, 128, 10).unwrap();
    let _ = run_text(&backend, &cfg);
    assert!(backend
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::Build { local, .. } => Some(*local),
            _ => None,
        })
        .all(|l| l == 128));
}

#[test]
fn stderr_entry_point_runs_full_sequence() {
    let backend = RecordingBackend::without_fp64();
    let status = instruction_rate_test(&backend, &scenario()).unwrap();
    assert_eq!(
        status,
        HarnessStatus {
            measured: 4,
            failed: 0,
            unsupported: 1
        }
    );
    assert!(status.all_passed());
    assert_eq!(backend.enqueued().len(), 4);
}
