use anyhow::Result;
use async_trait::async_trait;

use crate::api::types::{CreateUserOutcome, LoginOutcome, LoginRequest, NewUser};
use crate::api::{ApiClient, Auth};

/// Account endpoints the credential lifecycle depends on
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// `POST /usuarios`
    async fn create_user(&self, user: &NewUser) -> Result<CreateUserOutcome>;

    /// `POST /login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome>;
}

#[async_trait]
impl IdentityApi for ApiClient {
    async fn create_user(&self, user: &NewUser) -> Result<CreateUserOutcome> {
        let body = serde_json::to_value(user)?;
        let res = self
            .send(reqwest::Method::POST, "/usuarios", &[], Some(&body), Auth::None)
            .await?;
        Ok(CreateUserOutcome::from_response(res.status, &res.body))
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let body = serde_json::to_value(request)?;
        let res = self
            .send(reqwest::Method::POST, "/login", &[], Some(&body), Auth::None)
            .await?;
        Ok(LoginOutcome::from_response(res.status, &res.body))
    }
}
