use super::types::{AggregateReport, RunMetrics};
use anyhow::Result;
use std::path::Path;

pub const MERGED_FILE: &str = "merged.json";
pub const METRICS_FILE: &str = "advanced-metrics.json";

/// Write the aggregate as `merged.json`
pub fn write_merged(report: &AggregateReport, output_dir: &Path) -> Result<std::path::PathBuf> {
    let path = output_dir.join(MERGED_FILE);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

pub fn write_metrics(metrics: &RunMetrics, output_dir: &Path) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(METRICS_FILE);
    let json = serde_json::to_string_pretty(metrics)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

pub fn read_metrics(output_dir: &Path) -> Option<RunMetrics> {
    let content = std::fs::read_to_string(output_dir.join(METRICS_FILE)).ok()?;
    match serde_json::from_str(&content) {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            log::warn!("Ignoring unreadable {}: {}", METRICS_FILE, e);
            None
        }
    }
}
