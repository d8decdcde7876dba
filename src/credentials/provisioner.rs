use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use super::error::CredentialError;
use super::identity::IdentityApi;
use super::types::{Credential, Role};
use crate::api::types::{CreateUserOutcome, NewUser};

/// Bounded retry for e-mail collisions
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total create attempts, the first one included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`, capped
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Generated account identity, before the service has accepted it
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub session_id: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
}

/// Creates throwaway accounts on the service
#[derive(Debug, Clone)]
pub struct CredentialProvisioner {
    policy: RetryPolicy,
    email_domain: String,
    last_issued: Option<DateTime<Utc>>,
}

impl CredentialProvisioner {
    pub fn new(policy: RetryPolicy, email_domain: &str) -> Self {
        Self {
            policy,
            email_domain: email_domain.to_string(),
            last_issued: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Build a fresh identity from `<unix-millis>_<8 base36 chars>`
    pub fn generate_identity(&self, role: Role, display_name: Option<&str>) -> Identity {
        let millis = Utc::now().timestamp_millis();
        let random_id = random_base36(8);
        let session_id = format!("{}_{}", millis, random_id);
        let prefix = role.name_prefix();
        let millis_str = millis.to_string();
        let last4 = &millis_str[millis_str.len().saturating_sub(4)..];

        Identity {
            display_name: display_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}_Session_{}", prefix, session_id)),
            email: format!(
                "{}.session.{}@{}",
                role.as_str(),
                session_id,
                self.email_domain
            ),
            password: format!("{}Ses{}{}!", prefix, random_id, last4),
            session_id,
        }
    }

    /// Create an account for `role`, regenerating the identity while the e-mail collides.
    pub async fn provision<A>(
        &mut self,
        api: &A,
        role: Role,
        display_name: Option<&str>,
    ) -> Result<Credential, CredentialError>
    where
        A: IdentityApi + ?Sized,
    {
        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff_for(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let identity = self.generate_identity(role, display_name);
            let user = NewUser {
                nome: identity.display_name.clone(),
                email: identity.email.clone(),
                password: identity.password.clone(),
                administrador: role.is_privileged().to_string(),
            };

            match api.create_user(&user).await? {
                CreateUserOutcome::Created(created) => {
                    log::info!("Created {} account {}", role, identity.email);
                    return Ok(Credential {
                        identifier: created.id,
                        email: identity.email,
                        secret: identity.password,
                        display_name: identity.display_name,
                        is_privileged: role.is_privileged(),
                        issued_at: self.next_issued_at(Utc::now()),
                        auth_token: None,
                    });
                }
                CreateUserOutcome::DuplicateEmail { message } => {
                    log::warn!(
                        "E-mail {} already taken ({}), attempt {}/{}",
                        identity.email,
                        message,
                        attempt,
                        self.policy.max_attempts
                    );
                }
                CreateUserOutcome::Rejected { status, body } => {
                    log::error!(
                        "Creating {} account {} failed with {}: {}",
                        role,
                        identity.email,
                        status,
                        body
                    );
                    return Err(CredentialError::Rejected { role, status, body });
                }
            }
        }

        Err(CredentialError::DuplicateEmailExhausted {
            role,
            attempts: self.policy.max_attempts,
        })
    }

    /// Issue times never go backwards within one provisioner
    fn next_issued_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let issued = match self.last_issued {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_issued = Some(issued);
        issued
    }
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
