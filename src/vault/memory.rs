/// In-memory vault backend. Lost on process exit; used for tests and for
/// deployments that accept losing rehydration state across restarts.
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::VaultBackend;
use crate::entities::{format_token, EntityType};
use crate::error::{RedactorError, Result};
use crate::vault::{Vault, VaultEntry};

#[derive(Default)]
struct SessionStore {
    by_value: HashMap<(EntityType, String), String>,
    by_token: HashMap<String, VaultEntry>,
    counters: HashMap<EntityType, u64>,
}

pub struct MemoryVault {
    sessions: RwLock<HashMap<String, SessionStore>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RedactorError {
    RedactorError::VaultUnavailable("vault lock poisoned".into())
}

impl Vault for MemoryVault {
    fn get_or_create_token(
        &self,
        session: &str,
        entity_type: &EntityType,
        value: &str,
    ) -> Result<String> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let store = sessions.entry(session.to_string()).or_default();

        let key = (entity_type.clone(), value.to_string());
        if let Some(token) = store.by_value.get(&key) {
            return Ok(token.clone());
        }

        let counter = store.counters.entry(entity_type.clone()).or_insert(0);
        *counter += 1;
        let token = format_token(entity_type, *counter);

        store.by_value.insert(key, token.clone());
        store.by_token.insert(
            token.clone(),
            VaultEntry {
                session_id: session.to_string(),
                token: token.clone(),
                original_value: value.to_string(),
                entity_type: entity_type.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(token)
    }

    fn resolve_token(&self, session: &str, token: &str) -> Result<Option<String>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions
            .get(session)
            .and_then(|store| store.by_token.get(token))
            .map(|entry| entry.original_value.clone()))
    }

    fn dump(&self, session: &str) -> Result<Vec<VaultEntry>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let mut entries: Vec<VaultEntry> = sessions
            .get(session)
            .map(|store| store.by_token.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.token.cmp(&b.token)));
        Ok(entries)
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete_session(&self, session: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(session);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        VaultBackend::Memory.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_idempotent() {
        let vault = MemoryVault::new();
        let first = vault
            .get_or_create_token("s1", &EntityType::Email, "john@acme.com")
            .unwrap();
        let second = vault
            .get_or_create_token("s1", &EntityType::Email, "john@acme.com")
            .unwrap();
        assert_eq!(first, "«EMAIL_001»");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_values_get_distinct_numbers() {
        let vault = MemoryVault::new();
        let a = vault
            .get_or_create_token("s1", &EntityType::Phone, "+1 234-567-8910")
            .unwrap();
        let b = vault
            .get_or_create_token("s1", &EntityType::Phone, "555-123-4567")
            .unwrap();
        assert_eq!(a, "«PHONE_001»");
        assert_eq!(b, "«PHONE_002»");
    }

    #[test]
    fn counters_are_per_type() {
        let vault = MemoryVault::new();
        vault
            .get_or_create_token("s1", &EntityType::Email, "a@b.co")
            .unwrap();
        let ssn = vault
            .get_or_create_token("s1", &EntityType::Ssn, "123-45-6789")
            .unwrap();
        assert_eq!(ssn, "«SSN_001»");
    }

    #[test]
    fn sessions_are_isolated() {
        let vault = MemoryVault::new();
        let a = vault
            .get_or_create_token("alpha", &EntityType::Email, "a@b.co")
            .unwrap();
        assert_eq!(
            vault.resolve_token("beta", &a).unwrap(),
            None,
            "token must not leak across sessions"
        );
        let b = vault
            .get_or_create_token("beta", &EntityType::Email, "other@b.co")
            .unwrap();
        // both sessions start their own numbering
        assert_eq!(a, b);
    }

    #[test]
    fn delete_session_forgets_tokens() {
        let vault = MemoryVault::new();
        let token = vault
            .get_or_create_token("s1", &EntityType::Email, "a@b.co")
            .unwrap();
        vault.delete_session("s1").unwrap();
        assert_eq!(vault.resolve_token("s1", &token).unwrap(), None);
        assert!(vault.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn concurrent_allocation_of_same_value_agrees() {
        use std::sync::Arc;
        let vault = Arc::new(MemoryVault::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let vault = Arc::clone(&vault);
            handles.push(std::thread::spawn(move || {
                vault
                    .get_or_create_token("s1", &EntityType::Email, "john@acme.com")
                    .unwrap()
            }));
        }
        let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tokens.iter().all(|t| t == "«EMAIL_001»"));
    }
}
