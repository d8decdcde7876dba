use super::types::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("creating the {role} account was rejected with status {status}: {body}")]
    Rejected { role: Role, status: u16, body: String },

    #[error("could not find a free e-mail for the {role} account after {attempts} attempts")]
    DuplicateEmailExhausted { role: Role, attempts: u32 },

    #[error("login as {role} failed with status {status} even after re-provisioning: {body}")]
    LoginFailed { role: Role, status: u16, body: String },

    /// Transport or decoding failure talking to the service
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
