use crate::api::ApiCall;
use crate::report::types::{ResultFile, SpecNode, Stats, SuiteNode, TestError, TestNode};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Final state of a single test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed,
    Pending,
}

impl TestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
            TestOutcome::Pending => "pending",
        }
    }
}

/// State for a single test execution
#[derive(Debug, Clone)]
pub struct TestState {
    pub title: String,
    pub full_title: String,
    pub outcome: TestOutcome,
    pub started_at: Option<Instant>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub attempts: u32,
    pub api_calls: Vec<ApiCall>,
}

impl TestState {
    pub fn new(title: &str, full_title: &str) -> Self {
        Self {
            title: title.to_string(),
            full_title: full_title.to_string(),
            outcome: TestOutcome::Pending,
            started_at: None,
            duration_ms: 0,
            error: None,
            attempts: 0,
            api_calls: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.attempts += 1;
    }

    pub fn pass(&mut self) {
        self.finish(TestOutcome::Passed);
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.finish(TestOutcome::Failed);
        self.error = Some(error);
    }

    pub fn skip(&mut self, reason: String) {
        self.finish(TestOutcome::Pending);
        self.error = Some(reason);
    }

    fn finish(&mut self, outcome: TestOutcome) {
        self.outcome = outcome;
        if let Some(start) = self.started_at {
            self.duration_ms = start.elapsed().as_millis() as u64;
        }
    }

    pub fn to_node(&self) -> TestNode {
        TestNode {
            title: self.title.clone(),
            full_title: self.full_title.clone(),
            state: Some(self.outcome.as_str().to_string()),
            pass: self.outcome == TestOutcome::Passed,
            fail: self.outcome == TestOutcome::Failed,
            pending: self.outcome == TestOutcome::Pending,
            duration: self.duration_ms,
            err: TestError {
                message: self.error.clone(),
                estack: None,
            },
            api_calls: self.api_calls.clone(),
        }
    }
}

/// Test/pass/fail/pending counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub suites: u64,
    pub tests: u64,
    pub passes: u64,
    pub failures: u64,
    pub pending: u64,
}

impl Counts {
    fn add(&mut self, other: Counts) {
        self.suites += other.suites;
        self.tests += other.tests;
        self.passes += other.passes;
        self.failures += other.failures;
        self.pending += other.pending;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuiteState {
    pub title: String,
    pub tests: Vec<TestState>,
    pub suites: Vec<SuiteState>,
}

impl SuiteState {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Counts over this suite and every nested suite
    pub fn counts(&self) -> Counts {
        let mut counts = Counts {
            suites: 1,
            ..Default::default()
        };
        for test in &self.tests {
            counts.tests += 1;
            match test.outcome {
                TestOutcome::Passed => counts.passes += 1,
                TestOutcome::Failed => counts.failures += 1,
                TestOutcome::Pending => counts.pending += 1,
            }
        }
        for suite in &self.suites {
            counts.add(suite.counts());
        }
        counts
    }

    pub fn to_node(&self) -> SuiteNode {
        SuiteNode {
            title: self.title.clone(),
            tests: self.tests.iter().map(TestState::to_node).collect(),
            suites: self.suites.iter().map(SuiteState::to_node).collect(),
        }
    }
}

/// State for one spec execution
#[derive(Debug, Clone)]
pub struct SpecState {
    pub name: String,
    pub title: String,
    pub file: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub duration_ms: u64,
    pub suites: Vec<SuiteState>,
    started: Instant,
}

impl SpecState {
    pub fn new(name: &str, title: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            file: file.to_string(),
            started_at: Local::now(),
            finished_at: None,
            duration_ms: 0,
            suites: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
        self.duration_ms = self.started.elapsed().as_millis() as u64;
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for suite in &self.suites {
            counts.add(suite.counts());
        }
        counts
    }

    pub fn to_result_file(&self) -> ResultFile {
        let counts = self.counts();
        ResultFile {
            stats: Stats {
                suites: counts.suites,
                tests: counts.tests,
                passes: counts.passes,
                pending: counts.pending,
                failures: counts.failures,
                start: Some(self.started_at.to_rfc3339()),
                end: self.finished_at.map(|t| t.to_rfc3339()),
                duration: self.duration_ms,
            },
            results: vec![SpecNode {
                title: self.title.clone(),
                file: self.file.clone(),
                tests: Vec::new(),
                suites: self.suites.iter().map(SuiteState::to_node).collect(),
            }],
        }
    }
}

/// Totals for a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: String,
    pub specs: usize,
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub pending: u64,
    pub duration_ms: u64,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn add(&mut self, counts: Counts) {
        self.specs += 1;
        self.tests += counts.tests;
        self.passed += counts.passes;
        self.failed += counts.failures;
        self.pending += counts.pending;
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}
