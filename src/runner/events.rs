use super::state::{Counts, RunSummary};
use tokio::sync::broadcast;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Run events
    RunStarted {
        execution_id: String,
        spec_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Spec events
    SpecStarted {
        name: String,
        title: String,
        test_count: usize,
    },
    SpecFinished {
        name: String,
        counts: Counts,
        duration_ms: u64,
    },

    SuiteStarted {
        title: String,
        depth: usize,
    },

    // Test events
    TestStarted {
        title: String,
        depth: usize,
    },
    TestPassed {
        title: String,
        duration_ms: u64,
        depth: usize,
    },
    TestFailed {
        title: String,
        error: String,
        duration_ms: u64,
        depth: usize,
    },
    TestRetrying {
        title: String,
        attempt: u32,
        max_attempts: u32,
        depth: usize,
    },
    TestSkipped {
        title: String,
        reason: String,
        depth: usize,
    },

    // Log event for coordinated output
    Log {
        message: String,
        depth: usize,
    },
}

/// Event emitter for broadcasting test events
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates.
///
/// Returns once every emitter has been dropped.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;
        let mut current = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::debug!("Console listener skipped {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::RunStarted {
                    execution_id,
                    spec_count,
                } => {
                    println!(
                        "\n{} Test run started: {} ({} specs)",
                        "▶".green().bold(),
                        execution_id.cyan(),
                        spec_count
                    );
                }

                TestEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    println!("\n{} Test run finished", "■".blue().bold());
                    println!("  Specs: {}", summary.specs);
                    println!("  Tests: {}", summary.tests);
                    println!(
                        "  {} passed, {} failed, {} pending",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.pending.to_string().yellow()
                    );
                    println!("  Duration: {}ms", summary.duration_ms);
                    if summary.interrupted {
                        println!("  {}", "Interrupted by user".yellow());
                    }
                }

                TestEvent::SpecStarted {
                    title, test_count, ..
                } => {
                    println!(
                        "\n  {} Spec: {} ({} tests)",
                        "→".blue(),
                        title.white().bold(),
                        test_count
                    );
                }

                TestEvent::SpecFinished {
                    name,
                    counts,
                    duration_ms,
                } => {
                    let status = if counts.failures > 0 {
                        "FAILED".red().bold()
                    } else {
                        "PASSED".green().bold()
                    };
                    println!(
                        "  {} Spec {} [{}] {}/{} passed in {}ms",
                        "←".blue(),
                        name,
                        status,
                        counts.passes,
                        counts.tests,
                        duration_ms
                    );
                }

                TestEvent::SuiteStarted { title, depth } => {
                    let indent = "  ".repeat(depth);
                    println!("    {}{}", indent, title.bold());
                }

                TestEvent::TestStarted { title, depth } => {
                    let indent = "  ".repeat(depth);
                    current = format!("{}{}", indent, title);

                    let pb = ProgressBar::new_spinner();
                    if !interactive {
                        // No escape codes when output is piped
                        pb.set_draw_target(ProgressDrawTarget::hidden());
                    }
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    pb.set_message(format!("{}... ", current.dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::TestPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {} ({}ms)", "✓".green(), current, duration_ms);
                }

                TestEvent::TestFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {} ({}ms)", "✗".red(), current, duration_ms);
                    for line in error.lines().take(5) {
                        println!("        {}", line.red());
                    }
                }

                TestEvent::TestRetrying {
                    attempt,
                    max_attempts,
                    ..
                } => {
                    let msg = format!(
                        "{}... {}",
                        current.dimmed(),
                        format!("↻ retry {}/{}", attempt, max_attempts).yellow()
                    );
                    match &spinner {
                        Some(pb) if interactive => pb.set_message(msg),
                        _ => println!("    {}", msg),
                    }
                }

                TestEvent::TestSkipped { title, reason, depth } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let indent = "  ".repeat(depth);
                    println!(
                        "    {} {}{} ({})",
                        "○".yellow(),
                        indent,
                        title,
                        reason.dimmed()
                    );
                }

                TestEvent::Log { message, depth } => {
                    let indent = "  ".repeat(depth);
                    match &spinner {
                        Some(pb) => pb.println(format!("      {}{}", indent, message)),
                        None => println!("      {}{}", indent, message),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_stops_when_emitter_dropped() {
        let (emitter, receiver) = EventEmitter::new();
        let handle = tokio::spawn(ConsoleEventListener::listen(receiver));

        emitter.emit(TestEvent::Log {
            message: "hello".to_string(),
            depth: 0,
        });
        drop(emitter);

        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
