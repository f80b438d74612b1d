// SPDX-License-Identifier: AGPL-3.0-only

//! Instruction-rate micro-benchmark.
//!
//! Times one dispatch per operand type and prints
//! `"<rate> G <LABEL> Adds/sec"` per sub-test on stderr.
//!
//! Run on each GPU:
//!   INSTRATE_GPU_ADAPTER=3090  cargo run --release --bin instruction_rate
//!   INSTRATE_GPU_ADAPTER=titan INSTRATE_ITERATIONS=8192 cargo run --release --bin instruction_rate
//!
//! `--list-adapters` prints the adapters wgpu can see and exits.
//! `INSTRATE_FORMAT=json` writes one JSON object per sub-test to stdout.

use std::process::ExitCode;

use gpu_instruction_rate::gpu::GpuDevice;
use gpu_instruction_rate::{logging, run_harness, ReportFormat, TestConfiguration};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    if std::env::args().any(|a| a == "--list-adapters") {
        GpuDevice::print_available_adapters();
        return ExitCode::SUCCESS;
    }

    let config = match TestConfiguration::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let gpu = match GpuDevice::new().await {
        Ok(g) => g,
        Err(e) => {
            eprintln!("{e}");
            GpuDevice::print_available_adapters();
            return ExitCode::FAILURE;
        }
    };

    let format = ReportFormat::from_env();
    if format == ReportFormat::Text {
        println!("═══════════════════════════════════════════════════════════");
        println!("  Instruction Rate");
        println!("═══════════════════════════════════════════════════════════");
        gpu.print_info();
        println!("  Threads:      {:>12}", config.thread_count);
        println!("  Local size:   {:>12}", config.local_group_size);
        println!("  Iterations:   {:>12}", config.chase_iterations);
        println!();
    }

    let result = match format {
        ReportFormat::Text => run_harness(&gpu, &config, format, &mut std::io::stderr().lock()),
        ReportFormat::Json => run_harness(&gpu, &config, format, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(status) if status.all_passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
