use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Account role on the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Privileged account (`administrador: "true"`)
    Admin,
    /// Standard account
    User,
}

impl Role {
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub(crate) fn name_prefix(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" | "privileged" => Ok(Role::Admin),
            "user" | "standard" => Ok(Role::User),
            other => anyhow::bail!("Unknown role: {}", other),
        }
    }
}

/// A provisioned account. Field names on disk follow the fixture file layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    #[serde(rename = "id")]
    pub identifier: String,
    pub email: String,
    #[serde(rename = "password")]
    pub secret: String,
    #[serde(rename = "nome")]
    pub display_name: String,
    #[serde(rename = "isAdmin")]
    pub is_privileged: bool,
    #[serde(rename = "createdAt")]
    pub issued_at: DateTime<Utc>,
    #[serde(
        rename = "authToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_token: Option<String>,
}

impl Credential {
    pub fn role(&self) -> Role {
        if self.is_privileged {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.issued_at
    }
}

/// Both roles' credentials for one test session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentialSet {
    #[serde(rename = "admin")]
    pub privileged: Credential,
    #[serde(rename = "user")]
    pub standard: Credential,
    #[serde(deserialize_with = "string_or_number")]
    pub session_id: String,
}

impl SessionCredentialSet {
    pub fn get(&self, role: Role) -> &Credential {
        match role {
            Role::Admin => &self.privileged,
            Role::User => &self.standard,
        }
    }

    /// Valid while the privileged credential is younger than `ttl`
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.privileged.age(now) < ttl
    }
}

/// Older fixture files carry a numeric session id
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid sessionId: {}",
            other
        ))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_file_layout() {
        let json = r#"{
            "admin": {
                "id": "a1", "email": "admin@example.com", "password": "p",
                "nome": "Admin", "isAdmin": true, "createdAt": "2024-01-01T10:00:00.000Z",
                "authToken": "Bearer x"
            },
            "user": {
                "id": "u1", "email": "user@example.com", "password": "p",
                "nome": "User", "isAdmin": false, "createdAt": "2024-01-01T10:00:01.000Z"
            },
            "sessionId": 1704103201000
        }"#;

        let set: SessionCredentialSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.session_id, "1704103201000");
        assert_eq!(set.privileged.role(), Role::Admin);
        assert_eq!(set.standard.role(), Role::User);
        assert_eq!(set.privileged.auth_token.as_deref(), Some("Bearer x"));
        assert!(set.standard.auth_token.is_none());

        let back = serde_json::to_value(&set).unwrap();
        assert_eq!(back["admin"]["isAdmin"], true);
        assert!(back["user"].get("authToken").is_none());
    }

    #[test]
    fn test_validity_window() {
        let issued = Utc::now();
        let set = fixtures::set(issued);
        let ttl = Duration::minutes(30);

        assert!(set.is_valid(issued + Duration::minutes(29), ttl));
        assert!(!set.is_valid(issued + Duration::minutes(30), ttl));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("standard".parse::<Role>().unwrap(), Role::User);
        assert!("guest".parse::<Role>().is_err());
    }
}
