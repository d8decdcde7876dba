pub mod case;
pub mod events;
pub mod expect;
pub mod fixture;
pub mod state;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiClient;
use crate::credentials::manager_from_config;
use crate::report::types::{RunMetrics, SpecMetrics, SystemInfo};
use crate::report::{self, AggregateReport, ReportAggregator, ReportPaths};
use crate::utils::time::{execution_id, file_timestamp};
use crate::utils::Config;

pub use case::{skip, CaseFuture, Category, Priority, Skipped, SpecDef, SuiteDef, TestBody, TestCase};
pub use events::*;
pub use fixture::Fixture;
pub use state::*;

/// Which specs to run and what to do around them
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Spec names; empty means all
    pub specs: Vec<String>,
    pub category: Option<Category>,
    /// Every tag must be present on a spec
    pub tags: Vec<String>,
    pub generate_report: bool,
    /// Remove results of previous runs first
    pub clean: bool,
    /// Print progress to the console
    pub console: bool,
    /// Set on Ctrl+C; remaining tests are marked pending
    pub stop: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    pub report: Option<AggregateReport>,
    pub paths: Option<ReportPaths>,
}

/// Filter the catalog and order it by priority, high first
pub fn select_specs(catalog: Vec<SpecDef>, options: &RunOptions) -> Result<Vec<SpecDef>> {
    for name in &options.specs {
        if !catalog.iter().any(|s| &s.name == name) {
            let known: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
            anyhow::bail!("Unknown spec '{}'. Available: {}", name, known.join(", "));
        }
    }

    let mut selected: Vec<SpecDef> = catalog
        .into_iter()
        .filter(|s| options.specs.is_empty() || options.specs.contains(&s.name))
        .filter(|s| options.category.map_or(true, |c| s.category == c))
        .filter(|s| s.has_tags(&options.tags))
        .collect();
    selected.sort_by_key(|s| s.priority);
    Ok(selected)
}

/// Run the selected specs sequentially, writing one result file per spec
pub async fn run_suites(
    config: &Config,
    catalog: Vec<SpecDef>,
    options: RunOptions,
) -> Result<RunResult> {
    let specs = select_specs(catalog, &options)?;

    if options.clean {
        report::clean_old_reports(&config.reports_dir, &config.results_dir);
    }
    std::fs::create_dir_all(&config.results_dir).with_context(|| {
        format!(
            "Failed to create results directory {}",
            config.results_dir.display()
        )
    })?;

    let api = ApiClient::new(&config.base_url, config.request_timeout())?;
    let mut credentials = manager_from_config(config, api.clone());

    let (emitter, receiver) = EventEmitter::new();
    let listener = options
        .console
        .then(|| tokio::spawn(ConsoleEventListener::listen(receiver)));

    let started_at = Utc::now();
    let started = Instant::now();
    let mut summary = RunSummary {
        execution_id: execution_id(started_at),
        ..Default::default()
    };
    let mut spec_metrics = Vec::new();

    emitter.emit(TestEvent::RunStarted {
        execution_id: summary.execution_id.clone(),
        spec_count: specs.len(),
    });
    log::info!(
        "Running {} spec(s) against {}",
        specs.len(),
        config.base_url
    );

    let runner = SpecRunner {
        config,
        emitter: &emitter,
        stop: options.stop.as_deref(),
    };

    for spec in &specs {
        let spec_started_at = Utc::now();
        let mut fixture = Fixture::new(config, api.clone(), credentials);
        let state = runner.run_spec(spec, &mut fixture).await;
        credentials = fixture.teardown().await;

        let counts = state.counts();
        summary.add(counts);
        spec_metrics.push(SpecMetrics {
            spec: spec.name.clone(),
            started_at: spec_started_at,
            duration_ms: state.duration_ms,
            tests: counts.tests,
            passes: counts.passes,
            failures: counts.failures,
            pending: counts.pending,
        });

        if let Err(e) = write_result_file(config, &state) {
            log::error!("Failed to write results for {}: {:#}", spec.name, e);
        }
    }

    summary.duration_ms = started.elapsed().as_millis() as u64;
    summary.interrupted = runner.stopped();

    let metrics = RunMetrics {
        execution_id: summary.execution_id.clone(),
        started_at,
        finished_at: Utc::now(),
        system: SystemInfo::current(),
        specs: spec_metrics,
    };
    if let Err(e) = report::json::write_metrics(&metrics, &config.reports_dir) {
        log::warn!("Failed to write run metrics: {:#}", e);
    }

    emitter.emit(TestEvent::RunFinished {
        summary: summary.clone(),
    });
    drop(emitter);
    if let Some(handle) = listener {
        let _ = handle.await;
    }

    let (report, paths) = if options.generate_report {
        let aggregator = ReportAggregator::new(&config.results_dir).with_top_n(config.top_n);
        match report::generate_reports(&aggregator, &config.reports_dir) {
            Some((report, paths)) => (Some(report), Some(paths)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Ok(RunResult {
        summary,
        report,
        paths,
    })
}

fn write_result_file(config: &Config, state: &SpecState) -> Result<()> {
    let name = format!(
        "results-{}-{}.json",
        state.name,
        file_timestamp(state.started_at)
    );
    let path = config.results_dir.join(name);
    let json = serde_json::to_string_pretty(&state.to_result_file())?;
    std::fs::write(&path, json)?;
    log::debug!("Results written to {}", path.display());
    Ok(())
}

struct SpecRunner<'r> {
    config: &'r Config,
    emitter: &'r EventEmitter,
    stop: Option<&'r AtomicBool>,
}

impl<'r> SpecRunner<'r> {
    fn stopped(&self) -> bool {
        self.stop.map_or(false, |s| s.load(Ordering::SeqCst))
    }

    async fn run_spec(&self, spec: &SpecDef, fx: &mut Fixture) -> SpecState {
        let mut state = SpecState::new(&spec.name, &spec.title, &format!("suites/{}", spec.name));
        self.emitter.emit(TestEvent::SpecStarted {
            name: spec.name.clone(),
            title: spec.title.clone(),
            test_count: spec.test_count(),
        });

        for suite in &spec.suites {
            let suite_state = self.run_suite(fx, suite, Vec::new(), Vec::new(), 0).await;
            state.suites.push(suite_state);
        }

        state.finish();
        self.emitter.emit(TestEvent::SpecFinished {
            name: spec.name.clone(),
            counts: state.counts(),
            duration_ms: state.duration_ms,
        });
        state
    }

    /// Parent before-each hooks run before the suite's own
    fn run_suite<'a>(
        &'a self,
        fx: &'a mut Fixture,
        suite: &'a SuiteDef,
        mut hooks: Vec<Arc<dyn TestBody>>,
        mut parents: Vec<String>,
        depth: usize,
    ) -> BoxFuture<'a, SuiteState> {
        Box::pin(async move {
            let mut state = SuiteState::new(&suite.title);
            self.emitter.emit(TestEvent::SuiteStarted {
                title: suite.title.clone(),
                depth,
            });

            if let Some(hook) = &suite.before_each {
                hooks.push(hook.clone());
            }
            parents.push(suite.title.clone());

            for case in &suite.cases {
                let full_title = format!("{} {}", parents.join(" "), case.title);
                let test = self.run_test(fx, case, &hooks, &full_title, depth + 1).await;
                state.tests.push(test);
            }

            for child in &suite.children {
                let child_state = self
                    .run_suite(fx, child, hooks.clone(), parents.clone(), depth + 1)
                    .await;
                state.suites.push(child_state);
            }

            state
        })
    }

    async fn run_test(
        &self,
        fx: &mut Fixture,
        case: &TestCase,
        hooks: &[Arc<dyn TestBody>],
        full_title: &str,
        depth: usize,
    ) -> TestState {
        let mut test = TestState::new(&case.title, full_title);

        if self.stopped() {
            let reason = "run interrupted".to_string();
            self.emitter.emit(TestEvent::TestSkipped {
                title: case.title.clone(),
                reason: reason.clone(),
                depth,
            });
            test.skip(reason);
            return test;
        }

        self.emitter.emit(TestEvent::TestStarted {
            title: case.title.clone(),
            depth,
        });

        let max_attempts = self.config.retries + 1;
        let timeout = self.config.test_timeout();

        for attempt in 1..=max_attempts {
            // Drop calls left over from an earlier test or attempt
            fx.api.take_calls().await;
            test.start();

            let outcome = tokio::time::timeout(timeout, async {
                for hook in hooks {
                    hook.run(fx).await?;
                }
                case.body.run(fx).await
            })
            .await
            .unwrap_or_else(|_| {
                Err(anyhow::anyhow!(
                    "Timed out after {}ms",
                    timeout.as_millis()
                ))
            });

            test.api_calls = fx.api.take_calls().await;

            match outcome {
                Ok(()) => {
                    test.pass();
                    self.emitter.emit(TestEvent::TestPassed {
                        title: case.title.clone(),
                        duration_ms: test.duration_ms,
                        depth,
                    });
                    break;
                }
                Err(e) if e.downcast_ref::<Skipped>().is_some() => {
                    let reason = e.to_string();
                    test.skip(reason.clone());
                    self.emitter.emit(TestEvent::TestSkipped {
                        title: case.title.clone(),
                        reason,
                        depth,
                    });
                    break;
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    test.fail(error.clone());
                    if attempt < max_attempts && !self.stopped() {
                        log::debug!("{} failed on attempt {}: {}", full_title, attempt, error);
                        self.emitter.emit(TestEvent::TestRetrying {
                            title: case.title.clone(),
                            attempt,
                            max_attempts: max_attempts - 1,
                            depth,
                        });
                        continue;
                    }
                    self.emitter.emit(TestEvent::TestFailed {
                        title: case.title.clone(),
                        error,
                        duration_ms: test.duration_ms,
                        depth,
                    });
                    break;
                }
            }
        }

        test
    }
}
