pub mod aggregate;
pub mod benchmark;
pub mod html;
pub mod json;
pub mod junit;
pub mod types;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use aggregate::ReportAggregator;
pub use types::AggregateReport;

/// Files of one report generation
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub merged: PathBuf,
    pub html: PathBuf,
    pub junit: PathBuf,
    pub benchmark: PathBuf,
    /// Artifacts that could not be written; the others are still on disk
    pub failed: Vec<PathBuf>,
}

/// Aggregate every result file and write all artifacts.
///
/// Never fails: each artifact is written independently and every failure is logged.
/// `None` is returned only when the output directory cannot be created.
pub fn generate_reports(
    aggregator: &ReportAggregator,
    output_dir: &Path,
) -> Option<(AggregateReport, ReportPaths)> {
    let report = aggregator.aggregate();
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        log::error!(
            "Report generation failed: cannot create {}: {}",
            output_dir.display(),
            e
        );
        return None;
    }

    let paths = write_all(&report, output_dir);
    if paths.failed.is_empty() {
        log::info!("Reports written to {}", output_dir.display());
    } else {
        log::warn!(
            "Reports written to {} with {} failure(s)",
            output_dir.display(),
            paths.failed.len()
        );
    }
    Some((report, paths))
}

fn write_all(report: &AggregateReport, output_dir: &Path) -> ReportPaths {
    let metrics = json::read_metrics(output_dir);
    let mut failed = Vec::new();

    let mut record = |target: PathBuf, written: Result<PathBuf>| match written {
        Ok(path) => path,
        Err(e) => {
            log::error!("Failed to write {}: {:#}", target.display(), e);
            failed.push(target.clone());
            target
        }
    };

    let merged = record(
        output_dir.join(json::MERGED_FILE),
        json::write_merged(report, output_dir),
    );
    let html = record(
        output_dir.join(html::HTML_FILE),
        html::write_report(report, metrics.as_ref(), output_dir),
    );
    let junit = record(
        output_dir.join(junit::JUNIT_FILE),
        junit::write_report(report, output_dir),
    );
    let benchmark = record(
        output_dir.join(benchmark::BENCHMARK_FILE),
        benchmark::write_report(report, metrics.as_ref(), output_dir),
    );

    ReportPaths {
        merged,
        html,
        junit,
        benchmark,
        failed,
    }
}

/// Remove result files and generated artifacts of a previous run
pub fn clean_old_reports(reports_dir: &Path, results_dir: &Path) {
    let pattern = results_dir.join(aggregate::DEFAULT_PATTERN);
    let mut removed = 0;

    if let Ok(paths) = glob::glob(&pattern.to_string_lossy()) {
        for path in paths.flatten() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    for name in [
        json::MERGED_FILE,
        json::METRICS_FILE,
        html::HTML_FILE,
        junit::JUNIT_FILE,
        benchmark::BENCHMARK_FILE,
    ] {
        let path = reports_dir.join(name);
        if path.exists() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    log::info!("Removed {} old report file(s)", removed);
}
