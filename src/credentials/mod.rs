//! Dynamic credential lifecycle: throwaway accounts, a TTL cache, and the login flow

pub mod cache;
pub mod error;
pub mod identity;
pub mod manager;
#[cfg(test)]
pub(crate) mod mock;
pub mod provisioner;
pub mod types;

pub use cache::SessionCache;
pub use error::CredentialError;
pub use identity::IdentityApi;
pub use manager::CredentialManager;
pub use provisioner::{CredentialProvisioner, RetryPolicy};
pub use types::{Credential, Role, SessionCredentialSet};

use crate::api::ApiClient;
use crate::utils::Config;

/// Manager wired to the real service from configuration
pub fn manager_from_config(config: &Config, api: ApiClient) -> CredentialManager<ApiClient> {
    let storage = api.storage().clone();
    CredentialManager::new(
        api,
        CredentialProvisioner::new(config.retry_policy(), &config.provisioning.email_domain),
        SessionCache::new(&config.credentials_file, config.credential_ttl()),
        storage,
    )
}
