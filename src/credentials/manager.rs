use chrono::Utc;

use super::cache::SessionCache;
use super::error::CredentialError;
use super::identity::IdentityApi;
use super::provisioner::CredentialProvisioner;
use super::types::{Role, SessionCredentialSet};
use crate::api::types::{LoginOutcome, LoginRequest};
use crate::api::SessionStorage;

/// Login flow: cache lookup, provisioning on a miss, and one self-heal on a rejected login
pub struct CredentialManager<A: IdentityApi> {
    api: A,
    provisioner: CredentialProvisioner,
    cache: SessionCache,
    storage: SessionStorage,
}

impl<A: IdentityApi> CredentialManager<A> {
    pub fn new(
        api: A,
        provisioner: CredentialProvisioner,
        cache: SessionCache,
        storage: SessionStorage,
    ) -> Self {
        Self {
            api,
            provisioner,
            cache,
            storage,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SessionCache {
        &mut self.cache
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Memory, then file, then provision both roles (admin first)
    pub async fn ensure_session(&mut self) -> Result<SessionCredentialSet, CredentialError> {
        let now = Utc::now();
        if let Some(set) = self.cache.current(now) {
            return Ok(set);
        }
        if let Some(set) = self.cache.load_valid(now) {
            return Ok(set);
        }

        log::info!("Creating new session credentials");
        let privileged = self.provisioner.provision(&self.api, Role::Admin, None).await?;
        let standard = self.provisioner.provision(&self.api, Role::User, None).await?;

        let set = SessionCredentialSet {
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
            privileged,
            standard,
        };
        self.cache.store(&set);
        log::info!(
            "Session credentials ready: admin {}, user {}",
            set.privileged.email,
            set.standard.email
        );
        Ok(set)
    }

    /// Log in as `role` and keep the token in session storage.
    ///
    /// A rejected login re-provisions that role once; a second rejection is fatal.
    pub async fn login(&mut self, role: Role) -> Result<String, CredentialError> {
        let set = self.ensure_session().await?;
        let credential = set.get(role).clone();

        let (status, body) = match self.try_login(&credential.email, &credential.secret).await? {
            LoginOutcome::Authorized { authorization } => {
                self.remember_token(role, &set, &authorization).await;
                return Ok(authorization);
            }
            LoginOutcome::Denied { status, body } => (status, body),
        };

        log::warn!(
            "Login as {} ({}) rejected with {}: re-provisioning",
            role,
            credential.email,
            status
        );
        log::debug!("Rejected login body: {}", body);

        self.cache.invalidate(role);
        let fresh = self.provisioner.provision(&self.api, role, None).await?;
        self.cache.replace(role, fresh.clone());

        match self.try_login(&fresh.email, &fresh.secret).await? {
            LoginOutcome::Authorized { authorization } => {
                let set = self.ensure_session().await?;
                self.remember_token(role, &set, &authorization).await;
                Ok(authorization)
            }
            LoginOutcome::Denied { status, body } => {
                Err(CredentialError::LoginFailed { role, status, body })
            }
        }
    }

    /// Forget the token held in session storage
    pub async fn logout(&self) {
        self.storage.clear_token().await;
    }

    async fn try_login(&self, email: &str, secret: &str) -> Result<LoginOutcome, CredentialError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: secret.to_string(),
        };
        Ok(self.api.login(&request).await?)
    }

    async fn remember_token(&mut self, role: Role, set: &SessionCredentialSet, token: &str) {
        let mut credential = set.get(role).clone();
        credential.auth_token = Some(token.to_string());
        self.cache.replace(role, credential);
        self.storage.set_token(token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::mock::ScriptedIdentityApi;
    use crate::credentials::provisioner::RetryPolicy;
    use crate::credentials::types::fixtures;
    use chrono::Duration;

    fn manager(dir: &tempfile::TempDir) -> CredentialManager<ScriptedIdentityApi> {
        CredentialManager::new(
            ScriptedIdentityApi::new(),
            CredentialProvisioner::new(RetryPolicy::immediate(5), "example.com"),
            SessionCache::new(dir.path().join("creds.json"), Duration::minutes(30)),
            SessionStorage::new(),
        )
    }

    #[tokio::test]
    async fn test_provisions_admin_then_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);

        let set = manager.ensure_session().await.unwrap();
        assert!(set.privileged.is_privileged);
        assert!(!set.standard.is_privileged);
        assert!(set.standard.issued_at >= set.privileged.issued_at);

        let emails = manager.api().created_emails();
        assert!(emails[0].starts_with("admin.session."));
        assert!(emails[1].starts_with("user.session."));
        assert!(manager.cache().path().exists());
    }

    #[tokio::test]
    async fn test_fresh_file_is_reused_without_creating() {
        let dir = tempfile::tempdir().unwrap();
        let issued = Utc::now() - Duration::minutes(5);
        SessionCache::new(dir.path().join("creds.json"), Duration::minutes(30))
            .store(&fixtures::set(issued));

        let mut manager = manager(&dir);
        let set = manager.ensure_session().await.unwrap();

        assert_eq!(manager.api().create_calls(), 0);
        assert_eq!(set.privileged.issued_at, issued);
    }

    #[tokio::test]
    async fn test_stale_file_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let issued = Utc::now() - Duration::minutes(45);
        SessionCache::new(dir.path().join("creds.json"), Duration::minutes(30))
            .store(&fixtures::set(issued));

        let mut manager = manager(&dir);
        let set = manager.ensure_session().await.unwrap();

        assert_eq!(manager.api().create_calls(), 2);
        assert!(set.privileged.issued_at > issued);
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);

        let token = manager.login(Role::User).await.unwrap();
        assert_eq!(manager.storage().token().await, Some(token.clone()));

        let on_disk = manager.cache().read_file().unwrap();
        assert_eq!(on_disk.standard.auth_token, Some(token));
        assert!(on_disk.privileged.auth_token.is_none());

        manager.logout().await;
        assert!(manager.storage().token().await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_login_reprovisions_only_that_role() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);
        let before = manager.ensure_session().await.unwrap();

        manager.api().push_login_denied();
        manager.login(Role::User).await.unwrap();

        assert_eq!(manager.api().create_calls(), 3);
        assert_eq!(manager.api().login_calls(), 2);

        let after = manager.cache().read_file().unwrap();
        assert_eq!(after.privileged.email, before.privileged.email);
        assert_ne!(after.standard.email, before.standard.email);
        assert_eq!(manager.api().login_emails()[1], after.standard.email);
    }

    #[tokio::test]
    async fn test_second_rejection_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);

        manager.api().push_login_denied();
        manager.api().push_login_denied();
        let err = manager.login(Role::Admin).await.unwrap_err();

        assert!(matches!(
            err,
            CredentialError::LoginFailed {
                role: Role::Admin,
                status: 401,
                ..
            }
        ));
        assert!(manager.storage().token().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_reprovision_never_reuses_rejected_credential() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);
        let before = manager.ensure_session().await.unwrap();

        manager.api().push_login_denied();
        manager.api().push_rejected(500, r#"{"message":"erro interno"}"#);
        let err = manager.login(Role::User).await.unwrap_err();
        assert!(matches!(err, CredentialError::Rejected { status: 500, .. }));
        assert!(!manager.cache().path().exists());

        let after = manager.ensure_session().await.unwrap();
        assert_ne!(after.standard.email, before.standard.email);
        assert_eq!(manager.api().create_calls(), 5);
    }
}
