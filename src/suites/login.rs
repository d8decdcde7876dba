use anyhow::{ensure, Result};
use reqwest::Method;

use crate::api::types::{LoginRequest, MSG_LOGIN_INVALID, MSG_LOGIN_OK};
use crate::api::Auth;
use crate::credentials::Role;
use crate::data;
use crate::runner::{expect, CaseFuture, Fixture, Priority, SpecDef, SuiteDef};

pub fn spec() -> SpecDef {
    SpecDef::new("login", "Login API")
        .description("Login with provisioned and invalid credentials")
        .priority(Priority::High)
        .tags(&["api", "login", "auth"])
        .suite(
            SuiteDef::new("Login")
                .case("[POST] logs in with provisioned credentials", provisioned_login)
                .case("[POST] stores the token of the active role", stored_token)
                .case("[POST] rejects unknown credentials", unknown_credentials)
                .case("[POST] rejects a wrong password", wrong_password),
        )
}

async fn post_login(fx: &Fixture, request: &LoginRequest) -> Result<crate::api::ApiResponse> {
    let body = serde_json::to_value(request)?;
    fx.api
        .send(Method::POST, "login", &[], Some(&body), Auth::None)
        .await
}

fn provisioned_login(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let session = fx.session().await?;
        let request = LoginRequest {
            email: session.standard.email.clone(),
            password: session.standard.secret.clone(),
        };

        let res = post_login(fx, &request).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_LOGIN_OK)?;
        let token = res.str_field("authorization").unwrap_or_default();
        ensure!(token.starts_with("Bearer "), "unexpected authorization {:?}", token);
        Ok(())
    })
}

fn stored_token(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let token = fx.login(Role::User).await?;
        ensure!(!token.is_empty(), "empty token");
        let stored = fx.api.storage().token().await;
        ensure!(stored.as_deref() == Some(token.as_str()), "token was not stored");

        fx.logout().await;
        ensure!(fx.api.storage().token().await.is_none(), "token survived logout");
        Ok(())
    })
}

fn unknown_credentials(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let user = data::user(false);
        let request = LoginRequest {
            email: user.email,
            password: user.password,
        };
        let res = post_login(fx, &request).await?;
        expect::status(&res, 401)?;
        expect::message(&res, MSG_LOGIN_INVALID)
    })
}

fn wrong_password(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let session = fx.session().await?;
        let request = LoginRequest {
            email: session.standard.email.clone(),
            password: format!("{}-wrong", session.standard.secret),
        };
        let res = post_login(fx, &request).await?;
        expect::status(&res, 401)?;
        expect::message(&res, MSG_LOGIN_INVALID)
    })
}
