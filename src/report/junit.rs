use super::types::{AggregateReport, TestResultRecord};
use crate::runner::state::TestOutcome;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const JUNIT_FILE: &str = "junit.xml";

/// Generate JUnit XML with one `<testsuite>` per spec
pub fn generate_junit_xml(report: &AggregateReport) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let totals = &report.totals;
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "serverest-tester"));
    suites_start.push_attribute(("tests", totals.tests.to_string().as_str()));
    suites_start.push_attribute(("failures", totals.failures.to_string().as_str()));
    suites_start.push_attribute(("skipped", totals.pending.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(totals.duration_ms).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    for spec in &report.specs {
        let tests: Vec<&TestResultRecord> = report
            .tests
            .iter()
            .filter(|t| t.spec == spec.spec)
            .collect();

        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", spec.spec.as_str()));
        suite_start.push_attribute(("tests", tests.len().to_string().as_str()));
        suite_start.push_attribute(("failures", spec.failures.to_string().as_str()));
        suite_start.push_attribute(("skipped", spec.pending.to_string().as_str()));
        suite_start.push_attribute(("time", seconds(spec.duration_ms).as_str()));
        if let Some(ts) = &spec.timestamp {
            suite_start.push_attribute(("timestamp", ts.as_str()));
        }
        writer.write_event(Event::Start(suite_start))?;

        for test in tests {
            write_test_case(&mut writer, test)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    test: &TestResultRecord,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    let classname = if test.suite_hierarchy.is_empty() {
        test.spec.clone()
    } else {
        format!("{}.{}", test.spec, test.suite_hierarchy.join("."))
    };

    case_start.push_attribute(("name", test.title.as_str()));
    case_start.push_attribute(("classname", classname.as_str()));
    case_start.push_attribute(("time", seconds(test.duration_ms).as_str()));

    match test.outcome {
        TestOutcome::Passed => {
            writer.write_event(Event::Empty(case_start))?;
            return Ok(());
        }
        TestOutcome::Failed => {
            writer.write_event(Event::Start(case_start))?;
            let message = test.error.as_deref().unwrap_or("Unknown error");
            let first_line = message.lines().next().unwrap_or_default();

            let mut fail_start = BytesStart::new("failure");
            fail_start.push_attribute(("message", first_line));
            fail_start.push_attribute(("type", "AssertionError"));
            writer.write_event(Event::Start(fail_start))?;
            writer.write_event(Event::Text(BytesText::new(message)))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        TestOutcome::Pending => {
            writer.write_event(Event::Start(case_start))?;
            let mut skipped = BytesStart::new("skipped");
            if let Some(reason) = &test.error {
                skipped.push_attribute(("message", reason.as_str()));
            }
            writer.write_event(Event::Empty(skipped))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

pub fn write_report(report: &AggregateReport, output_dir: &Path) -> Result<PathBuf> {
    let xml = generate_junit_xml(report)?;
    let path = output_dir.join(JUNIT_FILE);
    std::fs::write(&path, xml)?;
    Ok(path)
}
