use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serverest_tester::api::ApiClient;
use serverest_tester::credentials::{self, Role, SessionCache};
use serverest_tester::report::{self, ReportAggregator};
use serverest_tester::runner::{self, Category, RunOptions};
use serverest_tester::suites;
use serverest_tester::utils::time::format_duration;
use serverest_tester::utils::Config;

#[derive(Parser)]
#[command(name = "serverest-tester")]
#[command(version)]
#[command(about = "End-to-end API tests for the ServeRest e-commerce service", long_about = None)]
struct Cli {
    /// Config file (defaults to ./serverest-tester.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the service, overrides config and environment
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run specs against the service
    Run {
        /// Spec name(s) to run. Can be specified multiple times.
        #[arg(short, long)]
        spec: Vec<String>,

        /// Only run specs of this category
        #[arg(long, value_enum)]
        category: Option<Category>,

        /// Filter specs by tags (comma-separated, all must match)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Skip report generation after the run
        #[arg(long, default_value = "false")]
        no_report: bool,

        /// Keep result files of previous runs
        #[arg(long, default_value = "false")]
        keep_reports: bool,
    },

    /// Aggregate existing result files into reports
    Report {
        /// Directory holding results-*.json files
        #[arg(short, long)]
        results: Option<PathBuf>,

        /// Output directory for the artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the session credential set
    Credentials {
        #[command(subcommand)]
        command: CredentialCommands,
    },

    /// List available specs
    Suites,
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Reuse the cached set or provision a new one
    Ensure,

    /// Log in with a role and print the token
    Login {
        /// admin or user (defaults to the privileged account)
        #[arg(short, long, default_value = "admin")]
        role: Role,
    },

    /// Print the cached set and its age
    Show,

    /// Delete the cached set
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    match cli.command {
        Commands::Run {
            spec,
            category,
            tags,
            no_report,
            keep_reports,
        } => {
            let tags = tags.unwrap_or_default();

            println!("{} Running specs against: {}", "▶".green().bold(), config.base_url.cyan());
            if !spec.is_empty() {
                println!("  Specs: {}", spec.join(", ").cyan());
            }
            if let Some(category) = category {
                println!("  Category: {}", category.to_string().cyan());
            }
            if !tags.is_empty() {
                println!("  Tags: {}", tags.join(", ").yellow());
            }
            println!("  Results: {}", config.results_dir.display().to_string().cyan());

            let stop = Arc::new(AtomicBool::new(false));
            let stop_handler = stop.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Stopping after the current test...", "⏹".yellow());
                stop_handler.store(true, Ordering::SeqCst);
            })?;

            let options = RunOptions {
                specs: spec,
                category,
                tags,
                generate_report: !no_report,
                clean: !keep_reports,
                console: true,
                stop: Some(stop),
            };

            let result = runner::run_suites(&config, suites::catalog(), options).await?;

            if let Some(paths) = &result.paths {
                print_paths(paths);
            }

            if !result.summary.success() {
                std::process::exit(1);
            }
        }

        Commands::Report { results, output } => {
            let results = results.unwrap_or_else(|| config.results_dir.clone());
            let output = output.unwrap_or_else(|| config.reports_dir.clone());

            println!(
                "{} Aggregating results from: {}",
                "📊".to_string().blue(),
                results.display()
            );

            let aggregator = ReportAggregator::new(&results).with_top_n(config.top_n);
            match report::generate_reports(&aggregator, &output) {
                Some((report, paths)) => {
                    let t = &report.totals;
                    println!(
                        "  {} specs, {} tests: {} passed, {} failed, {} pending in {}",
                        t.specs,
                        t.tests,
                        t.passes.to_string().green(),
                        t.failures.to_string().red(),
                        t.pending.to_string().yellow(),
                        format_duration(t.duration_ms)
                    );
                    if !report.skipped_files.is_empty() {
                        println!(
                            "  {} unreadable file(s) skipped",
                            report.skipped_files.len().to_string().yellow()
                        );
                    }
                    print_paths(&paths);
                }
                None => println!("{} Report generation failed", "✗".red()),
            }
        }

        Commands::Credentials { command } => {
            handle_credentials(&config, command).await?;
        }

        Commands::Suites => {
            println!("{} Available specs:", "📋".to_string().blue());
            for spec in suites::catalog() {
                println!(
                    "  {} {} [{} / {}] ({} tests)",
                    "•".cyan(),
                    spec.name.bold(),
                    spec.category,
                    spec.priority,
                    spec.test_count()
                );
                if !spec.description.is_empty() {
                    println!("      {}", spec.description.dimmed());
                }
                println!("      tags: {}", spec.tags.join(", ").dimmed());
            }
        }
    }

    Ok(())
}

async fn handle_credentials(config: &Config, command: CredentialCommands) -> anyhow::Result<()> {
    match command {
        CredentialCommands::Ensure => {
            let api = ApiClient::new(&config.base_url, config.request_timeout())?;
            let mut manager = credentials::manager_from_config(config, api);
            let set = manager.ensure_session().await?;
            println!("{} Session {}", "✓".green(), set.session_id.cyan());
            println!("  admin: {}", set.privileged.email);
            println!("  user:  {}", set.standard.email);
        }

        CredentialCommands::Login { role } => {
            let api = ApiClient::new(&config.base_url, config.request_timeout())?;
            let mut manager = credentials::manager_from_config(config, api);
            let token = manager.login(role).await?;
            println!("{} Logged in as {}", "✓".green(), role.to_string().cyan());
            println!("{}", token);
        }

        CredentialCommands::Show => {
            let cache = SessionCache::new(&config.credentials_file, config.credential_ttl());
            show_credentials(&cache);
        }

        CredentialCommands::Clear => {
            let mut cache = SessionCache::new(&config.credentials_file, config.credential_ttl());
            cache.clear();
            println!("{} Removed {}", "✓".green(), config.credentials_file.display());
        }
    }
    Ok(())
}

fn show_credentials(cache: &SessionCache) {
    let set = match cache.read_file() {
        Ok(set) => set,
        Err(e) => {
            println!("{} No usable credentials: {:#}", "○".yellow(), e);
            return;
        }
    };

    let now = chrono::Utc::now();
    let status = if set.is_valid(now, cache.ttl()) {
        "valid".green()
    } else {
        "expired".red()
    };
    println!(
        "Session {} [{}] in {}",
        set.session_id.cyan(),
        status,
        display(cache.path())
    );
    for credential in [&set.privileged, &set.standard] {
        println!(
            "  {:<5} {} (id {}, {}min old, token: {})",
            credential.role().to_string(),
            credential.email,
            credential.identifier,
            credential.age(now).num_minutes(),
            if credential.auth_token.is_some() { "yes" } else { "no" }
        );
    }
}

fn print_paths(paths: &report::ReportPaths) {
    println!("\n{} Reports:", "📄".to_string().blue());
    println!("  HTML:      {}", display(&paths.html).cyan());
    println!("  JSON:      {}", display(&paths.merged));
    println!("  JUnit:     {}", display(&paths.junit));
    println!("  Benchmark: {}", display(&paths.benchmark));
    for path in &paths.failed {
        println!("  {} not written: {}", "✗".red(), display(path));
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_role(args: &[&str]) -> Role {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Credentials {
                command: CredentialCommands::Login { role },
            } => role,
            _ => panic!("expected credentials login"),
        }
    }

    #[test]
    fn test_login_defaults_to_admin() {
        assert_eq!(
            login_role(&["serverest-tester", "credentials", "login"]),
            Role::Admin
        );
        assert_eq!(
            login_role(&["serverest-tester", "credentials", "login", "--role", "user"]),
            Role::User
        );
    }
}
