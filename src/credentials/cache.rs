use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::types::{Credential, Role, SessionCredentialSet};

/// Write-through cache of the session credential set: a JSON file plus an in-process map
/// keyed by role.
#[derive(Debug)]
pub struct SessionCache {
    path: PathBuf,
    ttl: Duration,
    memory: HashMap<Role, Credential>,
    session_id: Option<String>,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            memory: HashMap::new(),
            session_id: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// In-memory set, when both roles are present and still within the TTL
    pub fn current(&self, now: DateTime<Utc>) -> Option<SessionCredentialSet> {
        let set = SessionCredentialSet {
            privileged: self.memory.get(&Role::Admin)?.clone(),
            standard: self.memory.get(&Role::User)?.clone(),
            session_id: self.session_id.clone()?,
        };
        set.is_valid(now, self.ttl).then_some(set)
    }

    /// Read the backing file without any validity check
    pub fn read_file(&self) -> Result<SessionCredentialSet> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Load the backing file if it holds a set within the TTL.
    ///
    /// A stale, malformed or unreadable file is deleted and treated as a miss.
    pub fn load_valid(&mut self, now: DateTime<Utc>) -> Option<SessionCredentialSet> {
        if !self.path.exists() {
            return None;
        }

        match self.read_file() {
            Ok(set) if set.is_valid(now, self.ttl) => {
                log::info!(
                    "Reusing session credentials ({}min old)",
                    set.privileged.age(now).num_minutes()
                );
                self.mirror(&set);
                Some(set)
            }
            Ok(set) => {
                log::info!(
                    "Session credentials expired ({}min >= {}min), creating new ones",
                    set.privileged.age(now).num_minutes(),
                    self.ttl.num_minutes()
                );
                self.remove_file();
                None
            }
            Err(e) => {
                log::warn!("Discarding unreadable credential file: {:#}", e);
                self.remove_file();
                None
            }
        }
    }

    /// Persist the set and mirror it into memory. A failed write keeps the set in memory.
    pub fn store(&mut self, set: &SessionCredentialSet) {
        self.mirror(set);
        if let Err(e) = self.write_file(set) {
            log::warn!("Failed to save session credentials: {:#}", e);
        }
    }

    /// Swap one role's credential and persist the resulting set
    pub fn replace(&mut self, role: Role, credential: Credential) {
        self.memory.insert(role, credential);

        let set = match (
            self.memory.get(&Role::Admin),
            self.memory.get(&Role::User),
            self.session_id.as_ref(),
        ) {
            (Some(privileged), Some(standard), Some(session_id)) => SessionCredentialSet {
                privileged: privileged.clone(),
                standard: standard.clone(),
                session_id: session_id.clone(),
            },
            _ => return,
        };

        if let Err(e) = self.write_file(&set) {
            log::warn!("Failed to save session credentials: {:#}", e);
        }
    }

    /// Drop one role and delete the backing file, so a rejected credential is never reloaded.
    /// `replace` writes the file again once both roles are present.
    pub fn invalidate(&mut self, role: Role) {
        self.memory.remove(&role);
        self.remove_file();
    }

    /// Drop the in-memory set and delete the backing file
    pub fn clear(&mut self) {
        self.memory.clear();
        self.session_id = None;
        self.remove_file();
    }

    fn mirror(&mut self, set: &SessionCredentialSet) {
        self.memory.insert(Role::Admin, set.privileged.clone());
        self.memory.insert(Role::User, set.standard.clone());
        self.session_id = Some(set.session_id.clone());
    }

    fn write_file(&self, set: &SessionCredentialSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(set)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::debug!("Session credentials saved to {}", self.path.display());
        Ok(())
    }

    fn remove_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to delete {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::types::fixtures;

    fn cache_in(dir: &tempfile::TempDir) -> SessionCache {
        SessionCache::new(
            dir.path().join("fixtures").join("session-credentials.json"),
            Duration::minutes(30),
        )
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let set = fixtures::set(now);

        let mut cache = cache_in(&dir);
        cache.store(&set);
        assert!(cache.path().exists());
        assert_eq!(cache.current(now), Some(set.clone()));

        let mut fresh = cache_in(&dir);
        assert!(fresh.current(now).is_none());
        assert_eq!(fresh.load_valid(now + Duration::minutes(10)), Some(set.clone()));
        assert_eq!(fresh.current(now), Some(set));
    }

    #[test]
    fn test_stale_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let issued = Utc::now() - Duration::minutes(31);

        let mut cache = cache_in(&dir);
        cache.store(&fixtures::set(issued));

        let mut fresh = cache_in(&dir);
        assert!(fresh.load_valid(Utc::now()).is_none());
        assert!(!fresh.path().exists());
    }

    #[test]
    fn test_malformed_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        std::fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        std::fs::write(cache.path(), "{ not json").unwrap();

        assert!(cache.load_valid(Utc::now()).is_none());
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_replace_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let mut cache = cache_in(&dir);
        cache.store(&fixtures::set(now));

        cache.invalidate(Role::User);
        assert!(cache.current(now).is_none());
        assert!(!cache.path().exists());
        assert!(cache_in(&dir).load_valid(now).is_none());

        let mut replacement = fixtures::credential(Role::User, now);
        replacement.email = "replacement@example.com".to_string();
        cache.replace(Role::User, replacement);

        let on_disk = cache.read_file().unwrap();
        assert_eq!(on_disk.standard.email, "replacement@example.com");
        assert_eq!(
            cache.current(now).unwrap().standard.email,
            "replacement@example.com"
        );
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let mut cache = cache_in(&dir);
        cache.store(&fixtures::set(now));

        cache.clear();
        assert!(cache.current(now).is_none());
        assert!(!cache.path().exists());
    }
}
