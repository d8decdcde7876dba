use super::types::{AggregateReport, RunMetrics, TestResultRecord, TimedTest};
use crate::api::ApiCall;
use crate::runner::state::TestOutcome;
use crate::utils::time::format_duration;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub const HTML_FILE: &str = "report.html";

/// Write the dashboard as `report.html`
pub fn write_report(
    report: &AggregateReport,
    metrics: Option<&RunMetrics>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = output_dir.join(HTML_FILE);
    std::fs::write(&path, generate_html(report, metrics))?;
    Ok(path)
}

pub fn generate_html(report: &AggregateReport, metrics: Option<&RunMetrics>) -> String {
    let totals = &report.totals;
    let pass_rate = report.analysis.pass_rate.round() as u32;

    let spec_options: String = report
        .specs
        .iter()
        .map(|s| {
            format!(
                r#"<option value="{0}">{0}</option>"#,
                html_escape(&s.spec)
            )
        })
        .collect();

    let tests_html: String = report
        .tests
        .iter()
        .enumerate()
        .map(|(i, t)| test_row(i, t))
        .collect();

    let tests_section = if report.tests.is_empty() {
        r#"<div class="empty">No test results found.</div>"#.to_string()
    } else {
        tests_html
    };

    let system_html = metrics
        .map(|m| {
            format!(
                r#"
            <div class="card">
                <h3 class="card-title">System</h3>
                <div class="kv"><span>Execution</span><span>{}</span></div>
                <div class="kv"><span>OS</span><span>{} ({})</span></div>
                <div class="kv"><span>Arch</span><span>{}</span></div>
                <div class="kv"><span>CPUs</span><span>{}</span></div>
                <div class="kv"><span>Host</span><span>{}</span></div>
            </div>"#,
                html_escape(&m.execution_id),
                html_escape(&m.system.os),
                html_escape(&m.system.family),
                html_escape(&m.system.arch),
                m.system.cpus,
                html_escape(m.system.hostname.as_deref().unwrap_or("-")),
            )
        })
        .unwrap_or_default();

    let skipped_html = if report.skipped_files.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div class="warning">Skipped result files: {}</div>"#,
            html_escape(&report.skipped_files.join(", "))
        )
    };

    let spec_labels = json_array(report.analysis.spec_durations.iter().map(|s| s.spec.clone()));
    let spec_values: Vec<u64> = report
        .analysis
        .spec_durations
        .iter()
        .map(|s| s.duration_ms)
        .collect();
    let spec_values = serde_json::to_string(&spec_values).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ServeRest API Report</title>
    <link rel="preconnect" href="https://fonts.googleapis.com">
    <link rel="preconnect" href="https://fonts.gstatic.com" crossorigin>
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700;800&family=JetBrains+Mono:wght@400;500&display=swap" rel="stylesheet">
    <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
    <style>
        :root {{
            --bg-primary: #0a0f1d;
            --bg-secondary: #141b2d;
            --bg-tertiary: #1f2937;
            --border: #374151;
            --text-primary: #f9fafb;
            --text-secondary: #9ca3af;
            --green: #10b981;
            --red: #ef4444;
            --yellow: #f59e0b;
            --blue: #3b82f6;
            --purple: #8b5cf6;
            --glass: rgba(255, 255, 255, 0.03);
        }}

        * {{ margin: 0; padding: 0; box-sizing: border-box; }}

        body {{
            font-family: 'Inter', system-ui, -apple-system, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.5;
            padding: 3rem 1rem;
        }}

        .container {{ max-width: 1200px; margin: 0 auto; }}

        header {{
            margin-bottom: 3rem;
            display: flex;
            justify-content: space-between;
            align-items: flex-end;
        }}

        h1 {{
            font-size: 2.25rem;
            font-weight: 800;
            letter-spacing: -0.025em;
            background: linear-gradient(135deg, #fff 0%, #94a3b8 100%);
            -webkit-background-clip: text;
            -webkit-text-fill-color: transparent;
        }}

        .summary {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(170px, 1fr));
            gap: 1.5rem;
            margin-bottom: 3rem;
        }}

        .stat, .card {{
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            padding: 1.5rem;
            border-radius: 1rem;
        }}

        .stat-value {{ font-size: 2.5rem; font-weight: 800; margin-bottom: 0.25rem; }}
        .stat-label {{
            color: var(--text-secondary);
            font-size: 0.875rem;
            font-weight: 500;
            text-transform: uppercase;
            letter-spacing: 0.05em;
        }}
        .stat.passed .stat-value {{ color: var(--green); }}
        .stat.failed .stat-value {{ color: var(--red); }}
        .stat.pending .stat-value {{ color: var(--yellow); }}

        .progress-container {{ margin-bottom: 3rem; }}
        .progress-bar {{
            background: var(--bg-secondary);
            height: 12px;
            border-radius: 6px;
            overflow: hidden;
            border: 1px solid var(--border);
        }}
        .progress-fill {{
            height: 100%;
            background: linear-gradient(90deg, var(--green), #34d399);
        }}

        .grid {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(320px, 1fr));
            gap: 1.5rem;
            margin-bottom: 3rem;
        }}
        .card-title {{ font-size: 1.1rem; font-weight: 700; margin-bottom: 1rem; }}
        .chart-container {{ position: relative; height: 260px; }}
        .kv {{
            display: flex;
            justify-content: space-between;
            padding: 0.4rem 0;
            border-bottom: 1px solid var(--border);
            font-size: 0.875rem;
        }}
        .kv span:first-child {{ color: var(--text-secondary); }}

        table {{ width: 100%; border-collapse: collapse; font-size: 0.8125rem; }}
        th, td {{ text-align: left; padding: 0.4rem 0.5rem; border-bottom: 1px solid var(--border); }}
        th {{ color: var(--text-secondary); font-weight: 600; }}

        .filters {{
            display: flex;
            flex-wrap: wrap;
            gap: 1rem;
            margin-bottom: 1.5rem;
        }}
        .filter-input, .filter-select {{
            background: var(--bg-tertiary);
            color: var(--text-primary);
            border: 1px solid var(--border);
            border-radius: 0.5rem;
            padding: 0.5rem 0.75rem;
            font-size: 0.875rem;
        }}
        .filter-input {{ flex: 1; min-width: 220px; }}

        .test {{
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-radius: 0.75rem;
            margin-bottom: 0.5rem;
        }}
        .test-header {{
            padding: 0.9rem 1rem;
            display: flex;
            align-items: center;
            gap: 1rem;
            cursor: pointer;
        }}
        .test-header:hover {{ background: var(--bg-tertiary); }}
        .test-icon {{
            width: 2rem;
            height: 2rem;
            display: flex;
            align-items: center;
            justify-content: center;
            border-radius: 0.5rem;
            flex-shrink: 0;
        }}
        .test.passed .test-icon {{ background: rgba(16, 185, 129, 0.1); color: var(--green); }}
        .test.failed .test-icon {{ background: rgba(239, 68, 68, 0.1); color: var(--red); }}
        .test.pending .test-icon {{ background: rgba(245, 158, 11, 0.1); color: var(--yellow); }}
        .test-name {{ flex: 1; font-family: 'JetBrains Mono', monospace; font-size: 0.875rem; }}
        .test-spec {{ color: var(--purple); font-size: 0.75rem; font-weight: 600; }}
        .duration {{ color: var(--text-secondary); font-size: 0.75rem; font-weight: 500; }}
        .test-details {{ display: none; padding: 0 1rem 1rem 4rem; }}
        .test.open .test-details {{ display: block; }}

        .error-message {{
            background: rgba(239, 68, 68, 0.1);
            border-radius: 0.5rem;
            padding: 0.75rem;
            margin-bottom: 0.75rem;
            color: #fca5a5;
            font-size: 0.8125rem;
            font-family: 'JetBrains Mono', monospace;
            border: 1px solid rgba(239, 68, 68, 0.2);
            white-space: pre-wrap;
        }}
        .status-2 {{ color: var(--green); }}
        .status-4, .status-5 {{ color: var(--red); }}

        .warning {{
            background: rgba(245, 158, 11, 0.1);
            border: 1px solid rgba(245, 158, 11, 0.3);
            color: var(--yellow);
            padding: 0.75rem 1rem;
            border-radius: 0.75rem;
            margin-bottom: 2rem;
            font-size: 0.875rem;
        }}
        .empty {{ color: var(--text-secondary); text-align: center; padding: 3rem; }}

        .meta {{
            margin-top: 4rem;
            padding-top: 2rem;
            border-top: 1px solid var(--border);
            color: var(--text-secondary);
            font-size: 0.875rem;
            display: flex;
            justify-content: center;
            gap: 2rem;
        }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <div>
                <div style="font-size: 0.875rem; font-weight: 600; color: var(--purple); text-transform: uppercase; letter-spacing: 0.1em; margin-bottom: 0.5rem;">ServeRest API</div>
                <h1>Test Execution Report</h1>
            </div>
            <div style="text-align: right;">
                <div style="font-size: 0.875rem; color: var(--text-secondary);">Total Duration</div>
                <div style="font-size: 1.25rem; font-weight: 700;">{duration}</div>
            </div>
        </header>

        {skipped_html}

        <div class="summary">
            <div class="stat">
                <div class="stat-value">{specs}</div>
                <div class="stat-label">Specs</div>
            </div>
            <div class="stat">
                <div class="stat-value">{tests}</div>
                <div class="stat-label">Tests</div>
            </div>
            <div class="stat passed">
                <div class="stat-value">{passes}</div>
                <div class="stat-label">Passed</div>
            </div>
            <div class="stat failed">
                <div class="stat-value">{failures}</div>
                <div class="stat-label">Failed</div>
            </div>
            <div class="stat pending">
                <div class="stat-value">{pending}</div>
                <div class="stat-label">Pending</div>
            </div>
        </div>

        <div class="progress-container">
            <div style="display: flex; justify-content: space-between; margin-bottom: 0.75rem;">
                <span style="font-weight: 600; font-size: 0.875rem;">Success Rate</span>
                <span style="font-weight: 700; color: var(--green);">{pass_rate}%</span>
            </div>
            <div class="progress-bar">
                <div class="progress-fill" style="width: {pass_rate}%"></div>
            </div>
        </div>

        <div class="grid">
            <div class="card">
                <h3 class="card-title">Status Distribution</h3>
                <div class="chart-container"><canvas id="statusChart"></canvas></div>
            </div>
            <div class="card">
                <h3 class="card-title">Duration per Spec</h3>
                <div class="chart-container"><canvas id="performanceChart"></canvas></div>
            </div>
        </div>

        <div class="grid">
            <div class="card">
                <h3 class="card-title">Performance</h3>
                <div class="kv"><span>Average test duration</span><span>{average:.0}ms</span></div>
                <div class="kv"><span>Pass rate</span><span>{pass_rate_exact:.1}%</span></div>
                <h3 class="card-title" style="margin-top: 1.25rem;">Slowest Tests</h3>
                {slowest}
                <h3 class="card-title" style="margin-top: 1.25rem;">Fastest Tests</h3>
                {fastest}
            </div>
            {system_html}
        </div>

        <h2 style="margin-bottom: 1rem;">Tests</h2>
        <div class="filters">
            <input type="text" class="filter-input" id="searchFilter" placeholder="Search tests...">
            <select class="filter-select" id="statusFilter">
                <option value="">All statuses</option>
                <option value="passed">Passed</option>
                <option value="failed">Failed</option>
                <option value="pending">Pending</option>
            </select>
            <select class="filter-select" id="specFilter">
                <option value="">All specs</option>
                {spec_options}
            </select>
            <select class="filter-select" id="durationFilter">
                <option value="">Any duration</option>
                <option value="fast">Fast (&lt; 1s)</option>
                <option value="medium">Medium (1-3s)</option>
                <option value="slow">Slow (&gt; 3s)</option>
            </select>
        </div>

        <div id="tests">
            {tests_section}
        </div>

        <div class="meta">
            <span>Source: {source}</span>
            <span>Generated: {generated}</span>
        </div>
    </div>

    <script>
        function toggleTest(index) {{
            document.getElementById('test-' + index).classList.toggle('open');
        }}

        function applyFilters() {{
            const search = document.getElementById('searchFilter').value.toLowerCase();
            const status = document.getElementById('statusFilter').value;
            const spec = document.getElementById('specFilter').value;
            const duration = document.getElementById('durationFilter').value;

            document.querySelectorAll('.test').forEach(function (el) {{
                const ms = parseInt(el.dataset.duration, 10);
                let visible = true;
                if (search && !el.dataset.title.includes(search)) visible = false;
                if (status && el.dataset.status !== status) visible = false;
                if (spec && el.dataset.spec !== spec) visible = false;
                if (duration === 'fast' && ms >= 1000) visible = false;
                if (duration === 'medium' && (ms < 1000 || ms > 3000)) visible = false;
                if (duration === 'slow' && ms <= 3000) visible = false;
                el.style.display = visible ? '' : 'none';
            }});
        }}

        ['searchFilter', 'statusFilter', 'specFilter', 'durationFilter'].forEach(function (id) {{
            const el = document.getElementById(id);
            el.addEventListener('input', applyFilters);
            el.addEventListener('change', applyFilters);
        }});

        if (typeof Chart !== 'undefined') {{
            new Chart(document.getElementById('statusChart'), {{
                type: 'doughnut',
                data: {{
                    labels: ['Passed', 'Failed', 'Pending'],
                    datasets: [{{
                        data: [{passes}, {failures}, {pending}],
                        backgroundColor: ['#10b981', '#ef4444', '#f59e0b'],
                        borderWidth: 0
                    }}]
                }},
                options: {{ maintainAspectRatio: false, plugins: {{ legend: {{ labels: {{ color: '#9ca3af' }} }} }} }}
            }});

            new Chart(document.getElementById('performanceChart'), {{
                type: 'bar',
                data: {{
                    labels: {spec_labels},
                    datasets: [{{
                        label: 'Duration (ms)',
                        data: {spec_values},
                        backgroundColor: '#3b82f6'
                    }}]
                }},
                options: {{
                    maintainAspectRatio: false,
                    scales: {{
                        x: {{ ticks: {{ color: '#9ca3af' }} }},
                        y: {{ ticks: {{ color: '#9ca3af' }}, beginAtZero: true }}
                    }},
                    plugins: {{ legend: {{ display: false }} }}
                }}
            }});
        }}
    </script>
</body>
</html>"#,
        duration = format_duration(totals.duration_ms),
        skipped_html = skipped_html,
        specs = totals.specs,
        tests = totals.tests,
        passes = totals.passes,
        failures = totals.failures,
        pending = totals.pending,
        pass_rate = pass_rate,
        pass_rate_exact = report.analysis.pass_rate,
        average = report.analysis.average_duration_ms,
        slowest = timed_table(&report.analysis.slowest),
        fastest = timed_table(&report.analysis.fastest),
        system_html = system_html,
        spec_options = spec_options,
        tests_section = tests_section,
        source = html_escape(&report.source_dir),
        generated = report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        spec_labels = spec_labels,
        spec_values = spec_values,
    )
}

fn test_row(index: usize, test: &TestResultRecord) -> String {
    let (icon, class) = match test.outcome {
        TestOutcome::Passed => ("✓", "passed"),
        TestOutcome::Failed => ("✗", "failed"),
        TestOutcome::Pending => ("○", "pending"),
    };

    let error_html = test
        .error
        .as_deref()
        .map(|e| format!(r#"<div class="error-message">{}</div>"#, html_escape(e)))
        .unwrap_or_default();

    let calls_html = if test.api_calls.is_empty() {
        r#"<div class="duration">No API calls recorded</div>"#.to_string()
    } else {
        api_calls_table(&test.api_calls)
    };

    format!(
        r#"
            <div class="test {class}" id="test-{index}" data-status="{class}" data-spec="{spec}" data-duration="{duration_ms}" data-title="{search}">
                <div class="test-header" onclick="toggleTest({index})">
                    <div class="test-icon">{icon}</div>
                    <div class="test-name">{title}</div>
                    <span class="test-spec">{spec}</span>
                    <span class="duration">{duration}</span>
                </div>
                <div class="test-details">
                    {error_html}
                    {calls_html}
                </div>
            </div>"#,
        class = class,
        index = index,
        icon = icon,
        spec = html_escape(&test.spec),
        duration_ms = test.duration_ms,
        search = html_escape(&test.full_title.to_lowercase()),
        title = html_escape(&test.full_title),
        duration = format_duration(test.duration_ms),
        error_html = error_html,
        calls_html = calls_html,
    )
}

fn api_calls_table(calls: &[ApiCall]) -> String {
    let rows: String = calls
        .iter()
        .map(|c| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td class="status-{}">{}</td><td>{}ms</td></tr>"#,
                html_escape(&c.method),
                html_escape(&c.url),
                c.status / 100,
                c.status,
                c.duration_ms
            )
        })
        .collect();

    format!(
        r#"<table><thead><tr><th>Method</th><th>URL</th><th>Status</th><th>Time</th></tr></thead><tbody>{}</tbody></table>"#,
        rows
    )
}

fn timed_table(tests: &[TimedTest]) -> String {
    if tests.is_empty() {
        return r#"<div class="duration">-</div>"#.to_string();
    }
    let rows: String = tests
        .iter()
        .map(|t| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}ms</td></tr>",
                html_escape(&t.spec),
                html_escape(&t.full_title),
                t.duration_ms
            )
        })
        .collect();
    format!(
        "<table><thead><tr><th>Spec</th><th>Test</th><th>Duration</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}

/// JSON array literal safe to embed in a `<script>` block
fn json_array(items: impl Iterator<Item = String>) -> String {
    let items: Vec<String> = items.collect();
    serde_json::to_string(&items)
        .unwrap_or_else(|_| "[]".to_string())
        .replace('<', "\\u003c")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate::aggregate_files;

    #[test]
    fn test_empty_report_renders() {
        let report = aggregate_files(&[], 5);
        let html = generate_html(&report, None);
        assert!(html.contains("No test results found."));
        assert!(html.contains("<canvas id=\"statusChart\">"));
        assert!(!html.contains("Skipped result files"));
    }

    #[test]
    fn test_escapes_titles() {
        assert_eq!(html_escape("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
        assert_eq!(
            json_array(vec!["</script>".to_string()].into_iter()),
            "[\"\\u003c/script>\"]"
        );
    }
}
