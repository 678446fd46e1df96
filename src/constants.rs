/// Application-wide constants
///
/// Centralizes defaults and thresholds so tuning happens in one place.
// ============================================================================
// Service defaults
// ============================================================================

/// Default loopback port for the HTTP sidecar
pub const DEFAULT_PORT: u16 = 8787;

/// Session used when a request omits `session_id`
pub const DEFAULT_SESSION: &str = "default";

// ============================================================================
// Detection defaults
// ============================================================================

/// Minimum NER confidence; matches scoring below this are discarded
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.85;

/// Language tag handed to the NER analyzer
pub const DEFAULT_LANGUAGE: &str = "en";

/// Loopback port the Presidio analyzer process listens on
pub const PRESIDIO_PORT: u16 = 5033;

/// How long to wait for the analyzer process to come up before giving up
pub const PRESIDIO_STARTUP_TIMEOUT_SECS: u64 = 60;

/// Per-request timeout against a warm analyzer
pub const PRESIDIO_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Streaming rehydration
// ============================================================================

/// Upper bound on a buffered token prefix. A pending run longer than this
/// cannot be a token and is emitted verbatim.
pub const MAX_TOKEN_LEN: usize = 256;

// ============================================================================
// Vault
// ============================================================================

/// Filename of the persistent vault when only a directory is configured
pub const VAULT_DB_FILENAME: &str = "pii_vault.db";

/// SQLite busy timeout; allocation transactions queue behind this
pub const VAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Connection pool size for the SQLite backend
pub const VAULT_POOL_SIZE: u32 = 4;
