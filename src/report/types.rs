use crate::api::ApiCall;
use crate::runner::state::TestOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One per-spec result file (mochawesome layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultFile {
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub results: Vec<SpecNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    #[serde(default)]
    pub suites: u64,
    #[serde(default)]
    pub tests: u64,
    #[serde(default)]
    pub passes: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient_ms")]
    pub duration: u64,
}

impl Stats {
    pub fn add(&mut self, other: &Stats) {
        self.suites += other.suites;
        self.tests += other.tests;
        self.passes += other.passes;
        self.pending += other.pending;
        self.failures += other.failures;
        self.duration += other.duration;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecNode {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub tests: Vec<TestNode>,
    #[serde(default)]
    pub suites: Vec<SuiteNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuiteNode {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tests: Vec<TestNode>,
    #[serde(default)]
    pub suites: Vec<SuiteNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestNode {
    pub title: String,
    #[serde(default)]
    pub full_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub pass: bool,
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default, deserialize_with = "lenient_ms")]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "TestError::is_empty")]
    pub err: TestError,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_calls: Vec<ApiCall>,
}

impl TestNode {
    /// Explicit `state` wins; otherwise `pass` → passed, `pending` → pending, else failed
    pub fn outcome(&self) -> TestOutcome {
        match self.state.as_deref() {
            Some("passed") => TestOutcome::Passed,
            Some("failed") => TestOutcome::Failed,
            Some("pending") | Some("skipped") => TestOutcome::Pending,
            _ if self.pass => TestOutcome::Passed,
            _ if self.pending => TestOutcome::Pending,
            _ => TestOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estack: Option<String>,
}

impl TestError {
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.estack.is_none()
    }

    pub fn detail(&self) -> Option<String> {
        match (&self.message, &self.estack) {
            (Some(m), Some(s)) if s.contains(m.as_str()) => Some(s.clone()),
            (Some(m), Some(s)) => Some(format!("{}\n{}", m, s)),
            (Some(m), None) => Some(m.clone()),
            (None, Some(s)) => Some(s.clone()),
            (None, None) => None,
        }
    }
}

/// Durations may be written as integers, floats or null
fn lenient_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0))
}

/// A flattened test, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecord {
    pub spec: String,
    pub spec_file: String,
    pub suite_hierarchy: Vec<String>,
    pub title: String,
    pub full_title: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_calls: Vec<ApiCall>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub specs: u64,
    pub suites: u64,
    pub tests: u64,
    pub passes: u64,
    pub failures: u64,
    pub pending: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimedTest {
    pub spec: String,
    pub full_title: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
}

impl From<&TestResultRecord> for TimedTest {
    fn from(record: &TestResultRecord) -> Self {
        Self {
            spec: record.spec.clone(),
            full_title: record.full_title.clone(),
            outcome: record.outcome,
            duration_ms: record.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecSummary {
    pub spec: String,
    pub file: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub tests: u64,
    pub passes: u64,
    pub failures: u64,
    pub pending: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub average_duration_ms: f64,
    pub pass_rate: f64,
    pub slowest: Vec<TimedTest>,
    pub fastest: Vec<TimedTest>,
    /// Sorted by duration, longest first
    pub spec_durations: Vec<SpecSummary>,
}

/// Merged view over every result file of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub generated_at: DateTime<Utc>,
    pub source_dir: String,
    pub totals: Totals,
    pub analysis: Analysis,
    pub specs: Vec<SpecSummary>,
    pub tests: Vec<TestResultRecord>,
    pub skipped_files: Vec<String>,
}

impl AggregateReport {
    pub fn has_failures(&self) -> bool {
        self.totals.failures > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub family: String,
    pub cpus: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            hostname: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("COMPUTERNAME"))
                .ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecMetrics {
    pub spec: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tests: u64,
    pub passes: u64,
    pub failures: u64,
    pub pending: u64,
}

/// `advanced-metrics.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub system: SystemInfo,
    pub specs: Vec<SpecMetrics>,
}
