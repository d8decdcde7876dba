use anyhow::Result;
use std::collections::HashMap;

use super::case::skip;
use crate::api::ApiClient;
use crate::credentials::{CredentialManager, Role, SessionCredentialSet};
use crate::utils::Config;

/// A resource to delete when the spec ends, with the role allowed to delete it
#[derive(Debug, Clone, PartialEq)]
struct Tracked {
    endpoint: String,
    role: Role,
}

/// Per-spec context handed to every test body.
///
/// Owns the credential manager for the duration of the spec; `teardown` hands it back.
pub struct Fixture {
    pub api: ApiClient,
    config: Config,
    credentials: CredentialManager<ApiClient>,
    vars: HashMap<String, String>,
    cleanup: Vec<Tracked>,
}

impl Fixture {
    pub fn new(config: &Config, api: ApiClient, credentials: CredentialManager<ApiClient>) -> Self {
        Self {
            api,
            config: config.clone(),
            credentials,
            vars: HashMap::new(),
            cleanup: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Log in as `role`; the token is sent by every later request
    pub async fn login(&mut self, role: Role) -> Result<String> {
        Ok(self.credentials.login(role).await?)
    }

    pub async fn logout(&self) {
        self.credentials.logout().await;
    }

    pub async fn session(&mut self) -> Result<SessionCredentialSet> {
        Ok(self.credentials.ensure_session().await?)
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Like `var`, but marks the test pending when the variable was never set
    pub fn require_var(&self, name: &str) -> Result<String> {
        self.var(name)
            .map(str::to_string)
            .ok_or_else(|| skip(format!("{} was not created by an earlier test", name)))
    }

    /// Delete `endpoint` as `role` during teardown
    pub fn track(&mut self, endpoint: &str, role: Role) {
        self.cleanup.push(Tracked {
            endpoint: endpoint.to_string(),
            role,
        });
    }

    /// Forget a tracked resource that a test already deleted
    pub fn untrack(&mut self, endpoint: &str) {
        self.cleanup.retain(|t| t.endpoint != endpoint);
    }

    /// Delete tracked resources (last created first), clear the token and return the manager.
    ///
    /// Cleanup is best-effort; failures are logged.
    pub async fn teardown(mut self) -> CredentialManager<ApiClient> {
        while let Some(tracked) = self.cleanup.pop() {
            if let Err(e) = self.credentials.login(tracked.role).await {
                log::warn!("Cleanup login as {} failed: {}", tracked.role, e);
                continue;
            }
            match self.api.delete(&tracked.endpoint).await {
                Ok(res) if res.is_success() => {
                    log::debug!("Cleaned up {}", tracked.endpoint);
                }
                Ok(res) => log::warn!(
                    "Cleanup of {} returned {}: {}",
                    tracked.endpoint,
                    res.status,
                    res.body
                ),
                Err(e) => log::warn!("Cleanup of {} failed: {:#}", tracked.endpoint, e),
            }
        }

        self.credentials.logout().await;
        self.api.take_calls().await;
        self.credentials
    }
}
