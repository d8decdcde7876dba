//! Scripted in-memory `IdentityApi` for credential tests

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::identity::IdentityApi;
use crate::api::types::{CreateUserOutcome, CreatedResource, LoginOutcome, LoginRequest, NewUser};

/// Answers with queued outcomes first, then with success
#[derive(Default)]
pub struct ScriptedIdentityApi {
    create_script: Mutex<VecDeque<CreateUserOutcome>>,
    login_script: Mutex<VecDeque<LoginOutcome>>,
    created: Mutex<Vec<NewUser>>,
    logins: Mutex<Vec<String>>,
    create_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl ScriptedIdentityApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_duplicate(&self) {
        self.create_script
            .lock()
            .unwrap()
            .push_back(CreateUserOutcome::DuplicateEmail {
                message: "Este email já está sendo usado".to_string(),
            });
    }

    pub fn push_rejected(&self, status: u16, body: &str) {
        self.create_script
            .lock()
            .unwrap()
            .push_back(CreateUserOutcome::Rejected {
                status,
                body: body.to_string(),
            });
    }

    pub fn push_login_denied(&self) {
        self.login_script
            .lock()
            .unwrap()
            .push_back(LoginOutcome::Denied {
                status: 401,
                body: r#"{"message":"Email e/ou senha inválidos"}"#.to_string(),
            });
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn created_emails(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.email.clone())
            .collect()
    }

    pub fn login_emails(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityApi for ScriptedIdentityApi {
    async fn create_user(&self, user: &NewUser) -> Result<CreateUserOutcome> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(user.clone());

        let scripted = self.create_script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| {
            CreateUserOutcome::Created(CreatedResource {
                id: format!("id-{}", n),
                message: "Cadastro realizado com sucesso".to_string(),
            })
        }))
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.logins.lock().unwrap().push(request.email.clone());

        let scripted = self.login_script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| LoginOutcome::Authorized {
            authorization: format!("Bearer token-{}", n),
        }))
    }
}
