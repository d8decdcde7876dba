use super::types::{AggregateReport, RunMetrics, TimedTest};
use anyhow::Result;
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const BENCHMARK_FILE: &str = "benchmark-report.txt";

/// Number of specs listed as slowest/fastest
const SPEC_RANKING: usize = 3;

/// Plain-text benchmark of the run
pub fn generate_benchmark(report: &AggregateReport, metrics: Option<&RunMetrics>) -> String {
    let mut out = String::new();
    let totals = &report.totals;
    let average_spec_ms = if totals.specs > 0 {
        totals.duration_ms as f64 / totals.specs as f64
    } else {
        0.0
    };

    let _ = writeln!(out, "=== BENCHMARK REPORT - SERVEREST API ===");
    let _ = writeln!(out, "Date: {}", Local::now().format("%d/%m/%Y %H:%M:%S"));
    if let Some(m) = metrics {
        let _ = writeln!(out, "Execution: {}", m.execution_id);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY:");
    let _ = writeln!(out, "- Specs: {}", totals.specs);
    let _ = writeln!(
        out,
        "- Tests: {} ({} passed, {} failed, {} pending)",
        totals.tests, totals.passes, totals.failures, totals.pending
    );
    let _ = writeln!(out, "- Pass rate: {:.1}%", report.analysis.pass_rate);
    let _ = writeln!(out, "- Total duration: {}", secs(totals.duration_ms as f64));
    let _ = writeln!(out, "- Average per spec: {}", secs(average_spec_ms));
    let _ = writeln!(
        out,
        "- Average per test: {}",
        secs(report.analysis.average_duration_ms)
    );
    if let Some(m) = metrics {
        let wall = (m.finished_at - m.started_at).num_milliseconds().max(0);
        let _ = writeln!(out, "- Wall clock: {}", secs(wall as f64));
    }

    if let Some(m) = metrics {
        let _ = writeln!(out);
        let _ = writeln!(out, "SYSTEM:");
        let _ = writeln!(out, "- OS: {} ({})", m.system.os, m.system.family);
        let _ = writeln!(out, "- Arch: {}", m.system.arch);
        let _ = writeln!(out, "- CPUs: {}", m.system.cpus);
        if let Some(host) = &m.system.hostname {
            let _ = writeln!(out, "- Host: {}", host);
        }
    }

    let specs = &report.analysis.spec_durations;
    let _ = writeln!(out);
    let _ = writeln!(out, "SLOWEST SPECS:");
    for spec in specs.iter().take(SPEC_RANKING) {
        let _ = writeln!(out, "- {}: {}", spec.spec, secs(spec.duration_ms as f64));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "FASTEST SPECS:");
    for spec in specs.iter().rev().take(SPEC_RANKING) {
        let _ = writeln!(out, "- {}: {}", spec.spec, secs(spec.duration_ms as f64));
    }

    write_tests(&mut out, "SLOWEST TESTS:", &report.analysis.slowest);
    write_tests(&mut out, "FASTEST TESTS:", &report.analysis.fastest);

    if !report.skipped_files.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "SKIPPED FILES:");
        for name in &report.skipped_files {
            let _ = writeln!(out, "- {}", name);
        }
    }

    out
}

fn write_tests(out: &mut String, heading: &str, tests: &[TimedTest]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", heading);
    for test in tests {
        let _ = writeln!(
            out,
            "- [{}] {}: {}ms",
            test.spec, test.full_title, test.duration_ms
        );
    }
}

fn secs(ms: f64) -> String {
    format!("{:.2}s", ms / 1000.0)
}

pub fn write_report(
    report: &AggregateReport,
    metrics: Option<&RunMetrics>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = output_dir.join(BENCHMARK_FILE);
    std::fs::write(&path, generate_benchmark(report, metrics))?;
    Ok(path)
}
