/// The vault: authoritative store of the bijection between original values
/// and tokens, scoped by session.
///
/// Two backends share one interface. Callers hold the abstraction; there is
/// no global singleton — the vault is passed explicitly so tests stay
/// hermetic.
pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{RedactorConfig, VaultBackend};
use crate::entities::EntityType;
use crate::error::Result;
use crate::rehydrator::StreamRehydrator;

pub use memory::MemoryVault;
pub use sqlite::SqliteVault;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    pub session_id: String,
    pub token: String,
    pub original_value: String,
    pub entity_type: EntityType,
    pub created_at: DateTime<Utc>,
}

/// Session-scoped token store.
///
/// Semantics shared by all backends:
/// - `get_or_create_token` is idempotent and linearizable within a session:
///   the same `(session, type, value)` always yields the same token, and a
///   counter number handed out once is never reused.
/// - Sessions are isolated and live until explicitly deleted.
/// - Persistent backends must make a token durable before returning it.
pub trait Vault: Send + Sync {
    fn get_or_create_token(
        &self,
        session: &str,
        entity_type: &EntityType,
        value: &str,
    ) -> Result<String>;

    /// Look up a single token. Unknown tokens are `None`, not an error.
    fn resolve_token(&self, session: &str, token: &str) -> Result<Option<String>>;

    fn dump(&self, session: &str) -> Result<Vec<VaultEntry>>;

    fn list_sessions(&self) -> Result<Vec<String>>;

    fn delete_session(&self, session: &str) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

impl dyn Vault {
    /// Replace every known token in `text` with its original value; unknown
    /// tokens pass through verbatim.
    ///
    /// Runs the streaming rehydrator over the whole text in one feed, so
    /// full-text and chunked rehydration cannot disagree.
    pub fn rehydrate(&self, session: &str, text: &str) -> Result<String> {
        let mut stream = StreamRehydrator::new(self, session);
        let mut out = stream.feed(text)?;
        out.push_str(&stream.flush());
        Ok(out)
    }
}

/// Open the backend named by the configuration. The vault must be open
/// before the first request is accepted.
pub fn open_vault(config: &RedactorConfig) -> Result<Arc<dyn Vault>> {
    match config.vault_backend {
        VaultBackend::Memory => Ok(Arc::new(MemoryVault::new())),
        VaultBackend::Sqlite => {
            let path = config.resolve_vault_path()?;
            Ok(Arc::new(SqliteVault::open(&path)?))
        }
    }
}
