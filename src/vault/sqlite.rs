/// Persistent vault backend: a single SQLite file behind a small connection
/// pool.
///
/// Writes go through IMMEDIATE transactions with `synchronous=FULL`, so a
/// token is durable before it is ever returned to a caller — a crash between
/// allocation and return must not produce a token the vault no longer
/// recognizes. Any I/O failure surfaces as `VaultUnavailable`; there is no
/// silent fallback to an in-memory store.
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::VaultBackend;
use crate::constants::{VAULT_BUSY_TIMEOUT_MS, VAULT_POOL_SIZE};
use crate::entities::{format_token, EntityType};
use crate::error::{RedactorError, Result};
use crate::vault::{Vault, VaultEntry};

pub struct SqliteVault {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqliteVault {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RedactorError::VaultUnavailable(format!(
                        "cannot create vault directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = FULL;
                 PRAGMA busy_timeout = {VAULT_BUSY_TIMEOUT_MS};"
            ))
        });
        let pool = Pool::builder().max_size(VAULT_POOL_SIZE).build(manager)?;

        let vault = Self {
            pool,
            path: path.to_path_buf(),
        };
        vault.initialize_schema()?;
        debug!(path = %vault.path.display(), "sqlite vault open");
        Ok(vault)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                token TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                original_value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(session_id, token),
                UNIQUE(session_id, entity_type, original_value)
            );
            CREATE INDEX IF NOT EXISTS idx_vault_entries_session
                ON vault_entries(session_id);
            CREATE TABLE IF NOT EXISTS vault_counters (
                session_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                counter INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, entity_type)
            );",
        )?;
        Ok(())
    }
}

impl Vault for SqliteVault {
    fn get_or_create_token(
        &self,
        session: &str,
        entity_type: &EntityType,
        value: &str,
    ) -> Result<String> {
        let type_tag = entity_type.as_str().to_string();
        let mut conn = self.pool.get()?;
        // IMMEDIATE serializes writers; a concurrent allocator of the same
        // value waits here and then observes the winner's row below.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT token FROM vault_entries
                 WHERE session_id = ?1 AND entity_type = ?2 AND original_value = ?3",
                params![session, type_tag, value],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(token) = existing {
            return Ok(token);
        }

        tx.execute(
            "INSERT INTO vault_counters (session_id, entity_type, counter)
             VALUES (?1, ?2, 1)
             ON CONFLICT(session_id, entity_type) DO UPDATE SET counter = counter + 1",
            params![session, type_tag],
        )?;
        let counter: u64 = tx.query_row(
            "SELECT counter FROM vault_counters WHERE session_id = ?1 AND entity_type = ?2",
            params![session, type_tag],
            |row| row.get(0),
        )?;

        let token = format_token(entity_type, counter);
        tx.execute(
            "INSERT INTO vault_entries (session_id, token, entity_type, original_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session, token, type_tag, value, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(token)
    }

    fn resolve_token(&self, session: &str, token: &str) -> Result<Option<String>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT original_value FROM vault_entries
                 WHERE session_id = ?1 AND token = ?2",
                params![session, token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn dump(&self, session: &str) -> Result<Vec<VaultEntry>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT token, entity_type, original_value, created_at
             FROM vault_entries WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows: Vec<(String, String, String, String)> = stmt
            .query_map(params![session], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (token, type_tag, original_value, created_raw) in rows {
            let created_at = DateTime::parse_from_rfc3339(&created_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    RedactorError::VaultUnavailable(format!(
                        "corrupt created_at for {token}: {e}"
                    ))
                })?;
            entries.push(VaultEntry {
                session_id: session.to_string(),
                token,
                original_value,
                entity_type: EntityType::from_tag(&type_tag),
                created_at,
            });
        }
        Ok(entries)
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT session_id FROM vault_entries ORDER BY session_id")?;
        let sessions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(sessions)
    }

    fn delete_session(&self, session: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM vault_entries WHERE session_id = ?1",
            params![session],
        )?;
        tx.execute(
            "DELETE FROM vault_counters WHERE session_id = ?1",
            params![session],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        VaultBackend::Sqlite.as_str()
    }
}
