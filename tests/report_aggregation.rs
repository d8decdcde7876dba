use serde_json::{json, Value};
use std::path::Path;

use serverest_tester::report::{self, ReportAggregator};

fn test(title: &str, state: &str, duration: u64) -> Value {
    json!({
        "title": title,
        "fullTitle": format!("Suite {}", title),
        "state": state,
        "pass": state == "passed",
        "fail": state == "failed",
        "pending": state == "pending",
        "duration": duration,
        "err": if state == "failed" { json!({"message": "expected 201, got 400"}) } else { json!({}) }
    })
}

fn result_file(tests: Vec<Value>) -> Value {
    let count = |s: &str| tests.iter().filter(|t| t["state"] == s).count();
    let duration: u64 = tests.iter().filter_map(|t| t["duration"].as_u64()).sum();
    json!({
        "stats": {
            "suites": 1,
            "tests": tests.len(),
            "passes": count("passed"),
            "pending": count("pending"),
            "failures": count("failed"),
            "duration": duration
        },
        "results": [{
            "title": "Spec",
            "file": "suites/spec",
            "tests": [],
            "suites": [{ "title": "Suite", "tests": tests, "suites": [] }]
        }]
    })
}

fn write(dir: &Path, name: &str, value: &Value) {
    std::fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn test_sums_across_files_equal_the_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "results-produtos-07-03-2024-09-05-01.json",
        &result_file(vec![
            test("creates", "passed", 120),
            test("reads", "passed", 80),
            test("rejects", "failed", 300),
        ]),
    );
    write(
        dir.path(),
        "results-login-07-03-2024-09-05-02.json",
        &result_file(vec![test("logs in", "passed", 50)]),
    );
    write(
        dir.path(),
        "results-carrinhos-07-03-2024-09-05-03.json",
        &result_file(Vec::new()),
    );

    let report = ReportAggregator::new(dir.path()).aggregate();

    assert_eq!(report.totals.specs, 3);
    assert_eq!(report.totals.tests, 4);
    assert_eq!(report.totals.passes, 3);
    assert_eq!(report.totals.failures, 1);
    assert_eq!(report.totals.pending, 0);
    assert_eq!(report.tests.len(), 4);
    assert!(report.has_failures());
    assert!(report.skipped_files.is_empty());

    assert_eq!(report.analysis.slowest[0].full_title, "Suite rejects");
    assert_eq!(report.analysis.fastest[0].full_title, "Suite logs in");
    assert!((report.analysis.pass_rate - 75.0).abs() < f64::EPSILON);
}

#[test]
fn test_no_result_files_gives_zero_totals() {
    let dir = tempfile::tempdir().unwrap();
    let report = ReportAggregator::new(dir.path()).aggregate();
    assert_eq!(report.totals.tests, 0);
    assert!(report.tests.is_empty());
    assert!(!report.has_failures());

    let missing = ReportAggregator::new(dir.path().join("missing")).aggregate();
    assert_eq!(missing.totals.tests, 0);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "results-login-07-03-2024-09-05-02.json",
        &result_file(vec![test("logs in", "passed", 50)]),
    );
    std::fs::write(dir.path().join("results-broken.json"), "{ not json").unwrap();
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

    let report = ReportAggregator::new(dir.path()).aggregate();
    assert_eq!(report.totals.tests, 1);
    assert_eq!(report.skipped_files, vec!["results-broken.json".to_string()]);
}

#[test]
fn test_generate_reports_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    std::fs::create_dir_all(&results).unwrap();
    write(
        &results,
        "results-produtos-07-03-2024-09-05-01.json",
        &result_file(vec![
            test("creates <b>", "passed", 120),
            test("rejects", "failed", 300),
            test("skips", "pending", 0),
        ]),
    );

    let output = dir.path().join("out");
    let (report, paths) =
        report::generate_reports(&ReportAggregator::new(&results), &output).unwrap();
    assert_eq!(report.totals.pending, 1);
    assert!(paths.failed.is_empty());

    for path in [&paths.merged, &paths.html, &paths.junit, &paths.benchmark] {
        assert!(path.exists(), "{} missing", path.display());
    }

    let html = std::fs::read_to_string(&paths.html).unwrap();
    assert!(html.contains("creates &lt;b&gt;"));
    let junit = std::fs::read_to_string(&paths.junit).unwrap();
    assert!(junit.contains("<failure"));
    assert!(junit.contains("<skipped"));

    let merged: Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.merged).unwrap()).unwrap();
    assert_eq!(merged["totals"]["tests"], 3);

    report::clean_old_reports(&output, &results);
    assert!(!paths.html.exists());
    assert!(!results
        .join("results-produtos-07-03-2024-09-05-01.json")
        .exists());
}

#[test]
fn test_one_failed_artifact_does_not_block_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    std::fs::create_dir_all(&results).unwrap();
    write(
        &results,
        "results-login-07-03-2024-09-05-02.json",
        &result_file(vec![test("logs in", "passed", 50)]),
    );

    // A directory where merged.json should go makes that write fail
    let output = dir.path().join("out");
    std::fs::create_dir_all(output.join("merged.json")).unwrap();

    let (report, paths) =
        report::generate_reports(&ReportAggregator::new(&results), &output).unwrap();
    assert_eq!(report.totals.tests, 1);
    assert_eq!(paths.failed, vec![output.join("merged.json")]);

    for path in [&paths.html, &paths.junit, &paths.benchmark] {
        assert!(path.is_file(), "{} missing", path.display());
    }
}
