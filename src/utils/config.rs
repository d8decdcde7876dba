use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::RetryPolicy;

const DEFAULT_TTL_MINUTES: i64 = 30;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "serverest-tester.yaml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Base URL of the service under test
    pub base_url: String,

    /// JSON file holding the session credential set
    pub credentials_file: PathBuf,

    /// Directory for merged reports, dashboard and metrics
    pub reports_dir: PathBuf,

    /// Directory for per-spec result files
    pub results_dir: PathBuf,

    /// Maximum age of cached credentials (minutes)
    pub credential_ttl_minutes: i64,

    /// Timeout for a single HTTP request (ms)
    pub request_timeout_ms: u64,

    /// Timeout for a single test including its before-each hook (ms)
    pub test_timeout_ms: u64,

    /// Extra attempts for a failed test
    pub retries: u32,

    /// Response-time budget used by performance checks (ms)
    pub performance_budget_ms: u64,

    /// Number of slowest/fastest tests listed in the analysis
    pub top_n: usize,

    pub provisioning: ProvisioningConfig,
}

/// Account provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningConfig {
    /// Total create attempts when the e-mail keeps colliding
    pub max_attempts: u32,

    /// Delay before the first retry (ms), doubled on every further retry
    pub initial_backoff_ms: u64,

    /// Upper bound for the retry delay (ms)
    pub max_backoff_ms: u64,

    /// Domain used for generated e-mail addresses
    pub email_domain: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://serverest.dev".to_string(),
            credentials_file: PathBuf::from("fixtures/session-credentials.json"),
            reports_dir: PathBuf::from("reports"),
            results_dir: PathBuf::from("reports/results"),
            credential_ttl_minutes: DEFAULT_TTL_MINUTES,
            request_timeout_ms: 10000,
            test_timeout_ms: 30000,
            retries: 2,
            performance_budget_ms: 2500,
            top_n: 5,
            provisioning: ProvisioningConfig::default(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            email_domain: "example.com".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or from `serverest-tester.yaml` if it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `SERVEREST_*` overrides. Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SERVEREST_BASE_URL") {
            self.base_url = url;
        }
        if let Some(file) = lookup("SERVEREST_CREDENTIALS_FILE") {
            self.credentials_file = PathBuf::from(file);
        }
        if let Some(dir) = lookup("SERVEREST_REPORTS_DIR") {
            self.results_dir = PathBuf::from(&dir).join("results");
            self.reports_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup("SERVEREST_TTL_MINUTES") {
            match ttl.parse::<i64>() {
                Ok(v) if chrono::Duration::try_minutes(v).is_some() => {
                    self.credential_ttl_minutes = v
                }
                _ => log::warn!("Ignoring invalid SERVEREST_TTL_MINUTES: {}", ttl),
            }
        }
        if let Some(retries) = lookup("SERVEREST_RETRIES") {
            match retries.parse() {
                Ok(v) => self.retries = v,
                Err(_) => log::warn!("Ignoring invalid SERVEREST_RETRIES: {}", retries),
            }
        }
    }

    /// Credential TTL; an out-of-range value (e.g. from YAML) falls back to the default
    pub fn credential_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.credential_ttl_minutes).unwrap_or_else(|| {
            log::warn!(
                "credentialTtlMinutes {} is out of range, using {}",
                self.credential_ttl_minutes,
                DEFAULT_TTL_MINUTES
            );
            chrono::Duration::minutes(DEFAULT_TTL_MINUTES)
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.provisioning.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.provisioning.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.provisioning.max_backoff_ms),
        }
    }
}
