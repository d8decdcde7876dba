use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::types::{
    AggregateReport, Analysis, ResultFile, SpecSummary, Stats, SuiteNode, TestNode,
    TestResultRecord, TimedTest, Totals,
};
use crate::runner::state::TestOutcome;

pub const DEFAULT_PATTERN: &str = "results-*.json";
pub const DEFAULT_TOP_N: usize = 5;

/// Merges the per-spec result files of a run
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    results_dir: PathBuf,
    pattern: String,
    top_n: usize,
}

/// A result file that parsed successfully
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub result: ResultFile,
}

impl ReportAggregator {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Matching files in name order, plus the names of files that could not be used
    pub fn collect(&self) -> (Vec<LoadedFile>, Vec<String>) {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();

        if !self.results_dir.is_dir() {
            log::warn!(
                "Results directory {} not found, nothing to aggregate",
                self.results_dir.display()
            );
            return (loaded, skipped);
        }

        let pattern = self.results_dir.join(&self.pattern);
        let mut paths: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::warn!("Cannot access {}: {}", e.path().display(), e);
                        skipped.push(file_name(e.path()));
                        None
                    }
                })
                .collect(),
            Err(e) => {
                log::error!("Invalid result file pattern {}: {}", self.pattern, e);
                return (loaded, skipped);
            }
        };
        paths.sort();

        for path in paths {
            let name = file_name(&path);
            match load_file(&path) {
                Ok(result) => loaded.push(LoadedFile { name, result }),
                Err(e) => {
                    log::warn!("Skipping {}: {:#}", name, e);
                    skipped.push(name);
                }
            }
        }

        (loaded, skipped)
    }

    pub fn aggregate(&self) -> AggregateReport {
        let (files, skipped) = self.collect();
        log::info!(
            "Aggregating {} result file(s) from {}",
            files.len(),
            self.results_dir.display()
        );
        let mut report = aggregate_files(&files, self.top_n);
        report.source_dir = self.results_dir.display().to_string();
        report.skipped_files = skipped;
        report
    }
}

pub fn load_file(path: &Path) -> Result<ResultFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Totals and analysis over already loaded files
pub fn aggregate_files(files: &[LoadedFile], top_n: usize) -> AggregateReport {
    let mut stats = Stats::default();
    let mut specs = Vec::new();
    let mut tests = Vec::new();

    for file in files {
        stats.add(&file.result.stats);

        let records = flatten(&file.name, &file.result);
        specs.push(SpecSummary {
            spec: spec_name(&file.name),
            file: file
                .result
                .results
                .first()
                .map(|r| r.file.clone())
                .unwrap_or_default(),
            source: file.name.clone(),
            timestamp: extract_timestamp(&file.name).map(|t| t.to_string()),
            tests: file.result.stats.tests,
            passes: file.result.stats.passes,
            failures: file.result.stats.failures,
            pending: file.result.stats.pending,
            duration_ms: file.result.stats.duration,
        });
        tests.extend(records);
    }

    let totals = Totals {
        specs: files.len() as u64,
        suites: stats.suites,
        tests: stats.tests,
        passes: stats.passes,
        failures: stats.failures,
        pending: stats.pending,
        duration_ms: stats.duration,
    };

    let analysis = analyze(&totals, &tests, &specs, top_n);

    AggregateReport {
        generated_at: Utc::now(),
        source_dir: String::new(),
        totals,
        analysis,
        specs,
        tests,
        skipped_files: Vec::new(),
    }
}

fn analyze(
    totals: &Totals,
    tests: &[TestResultRecord],
    specs: &[SpecSummary],
    top_n: usize,
) -> Analysis {
    let average_duration_ms = if tests.is_empty() {
        0.0
    } else {
        tests.iter().map(|t| t.duration_ms as f64).sum::<f64>() / tests.len() as f64
    };

    let pass_rate = if totals.tests == 0 {
        0.0
    } else {
        totals.passes as f64 / totals.tests as f64 * 100.0
    };

    // Stable sorts keep input order on ties
    let mut timed: Vec<&TestResultRecord> = tests
        .iter()
        .filter(|t| t.outcome != TestOutcome::Pending)
        .collect();
    timed.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
    let slowest = timed.iter().take(top_n).map(|t| TimedTest::from(*t)).collect();
    timed.sort_by(|a, b| a.duration_ms.cmp(&b.duration_ms));
    let fastest = timed.iter().take(top_n).map(|t| TimedTest::from(*t)).collect();

    let mut spec_durations = specs.to_vec();
    spec_durations.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));

    Analysis {
        average_duration_ms,
        pass_rate,
        slowest,
        fastest,
        spec_durations,
    }
}

/// Depth-first list of every test in a result file
pub fn flatten(file_name: &str, result: &ResultFile) -> Vec<TestResultRecord> {
    let spec = spec_name(file_name);
    let mut records = Vec::new();

    for node in &result.results {
        let mut hierarchy = Vec::new();
        push_title(&mut hierarchy, &node.title);
        for test in &node.tests {
            records.push(record(&spec, &node.file, &hierarchy, test));
        }
        for suite in &node.suites {
            flatten_suite(&spec, &node.file, &hierarchy, suite, &mut records);
        }
    }

    records
}

fn flatten_suite(
    spec: &str,
    spec_file: &str,
    parents: &[String],
    suite: &SuiteNode,
    out: &mut Vec<TestResultRecord>,
) {
    let mut hierarchy = parents.to_vec();
    push_title(&mut hierarchy, &suite.title);

    for test in &suite.tests {
        out.push(record(spec, spec_file, &hierarchy, test));
    }
    for child in &suite.suites {
        flatten_suite(spec, spec_file, &hierarchy, child, out);
    }
}

fn push_title(hierarchy: &mut Vec<String>, title: &str) {
    let title = title.trim();
    if !title.is_empty() {
        hierarchy.push(title.to_string());
    }
}

fn record(spec: &str, spec_file: &str, hierarchy: &[String], test: &TestNode) -> TestResultRecord {
    let full_title = if test.full_title.is_empty() {
        let mut parts = hierarchy.to_vec();
        parts.push(test.title.clone());
        parts.join(" ")
    } else {
        test.full_title.clone()
    };

    TestResultRecord {
        spec: spec.to_string(),
        spec_file: spec_file.to_string(),
        suite_hierarchy: hierarchy.to_vec(),
        title: test.title.clone(),
        full_title,
        outcome: test.outcome(),
        duration_ms: test.duration,
        error: test.err.detail(),
        api_calls: test.api_calls.clone(),
    }
}

fn file_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^results-(?P<spec>.+?)(?:-(?P<ts>\d{2}-\d{2}-\d{4}-\d{2}-\d{2}-\d{2}))?\.json$")
            .ok()
    })
    .as_ref()
}

/// `results-<spec>-<dd-mm-yyyy-hh-mm-ss>.json` → `<spec>`; other names are used as-is
pub fn spec_name(file_name: &str) -> String {
    file_name_regex()
        .and_then(|re| re.captures(file_name))
        .and_then(|c| c.name("spec"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| file_name.trim_end_matches(".json").to_string())
}

/// Timestamp embedded in a result file name, if any
pub fn extract_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let ts = file_name_regex()?.captures(file_name)?.name("ts")?;
    NaiveDateTime::parse_from_str(ts.as_str(), "%d-%m-%Y-%H-%M-%S").ok()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(title: &str, outcome: TestOutcome, duration: u64) -> TestNode {
        TestNode {
            title: title.to_string(),
            state: Some(outcome.as_str().to_string()),
            pass: outcome == TestOutcome::Passed,
            fail: outcome == TestOutcome::Failed,
            pending: outcome == TestOutcome::Pending,
            duration,
            ..Default::default()
        }
    }

    #[test]
    fn test_spec_name_and_timestamp() {
        let name = "results-produtos-07-03-2024-09-05-01.json";
        assert_eq!(spec_name(name), "produtos");
        let ts = extract_timestamp(name).unwrap();
        assert_eq!(ts.to_string(), "2024-03-07 09:05:01");

        assert_eq!(spec_name("results-login.json"), "login");
        assert!(extract_timestamp("results-login.json").is_none());
        assert!(extract_timestamp("results-x-99-99-2024-00-00-00.json").is_none());
    }

    #[test]
    fn test_flatten_keeps_hierarchy() {
        let result = ResultFile {
            results: vec![super::super::types::SpecNode {
                title: "".to_string(),
                file: "suites/produtos".to_string(),
                tests: vec![test_node("root test", TestOutcome::Passed, 1)],
                suites: vec![SuiteNode {
                    title: "Produtos".to_string(),
                    tests: vec![test_node("lists", TestOutcome::Passed, 5)],
                    suites: vec![SuiteNode {
                        title: "  ".to_string(),
                        tests: vec![test_node("anonymous", TestOutcome::Failed, 7)],
                        suites: vec![],
                    }],
                }],
            }],
            ..Default::default()
        };

        let records = flatten("results-produtos.json", &result);
        assert_eq!(records.len(), 3);
        assert!(records[0].suite_hierarchy.is_empty());
        assert_eq!(records[1].suite_hierarchy, vec!["Produtos"]);
        assert_eq!(records[1].full_title, "Produtos lists");
        assert_eq!(records[2].suite_hierarchy, vec!["Produtos"]);
        assert_eq!(records[2].outcome, TestOutcome::Failed);
        assert_eq!(records[2].spec, "produtos");
    }

    #[test]
    fn test_slowest_excludes_pending_and_keeps_ties_in_order() {
        let result = ResultFile {
            stats: Stats {
                tests: 4,
                passes: 3,
                pending: 1,
                ..Default::default()
            },
            results: vec![super::super::types::SpecNode {
                suites: vec![SuiteNode {
                    title: "S".to_string(),
                    tests: vec![
                        test_node("a", TestOutcome::Passed, 10),
                        test_node("b", TestOutcome::Passed, 10),
                        test_node("c", TestOutcome::Pending, 999),
                        test_node("d", TestOutcome::Passed, 3),
                    ],
                    suites: vec![],
                }],
                ..Default::default()
            }],
        };
        let files = vec![LoadedFile {
            name: "results-s.json".to_string(),
            result,
        }];

        let report = aggregate_files(&files, 2);
        let slowest: Vec<_> = report.analysis.slowest.iter().map(|t| t.full_title.as_str()).collect();
        assert_eq!(slowest, vec!["S a", "S b"]);
        let fastest: Vec<_> = report.analysis.fastest.iter().map(|t| t.full_title.as_str()).collect();
        assert_eq!(fastest, vec!["S d", "S a"]);
        assert!((report.analysis.average_duration_ms - 255.5).abs() < f64::EPSILON);
        assert!((report.analysis.pass_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate_files(&[], DEFAULT_TOP_N);
        assert_eq!(report.totals.tests, 0);
        assert_eq!(report.totals.specs, 0);
        assert_eq!(report.analysis.pass_rate, 0.0);
        assert_eq!(report.analysis.average_duration_ms, 0.0);
        assert!(report.analysis.slowest.is_empty());
    }
}
