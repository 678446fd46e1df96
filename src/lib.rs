// Library exports for the PII redaction sidecar.
// The binary and the integration tests both build on these modules.

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod redactor;
pub mod rehydrator;
pub mod resolver;
pub mod scanners;
pub mod server;
pub mod vault;

// Re-export commonly used types
pub use config::{RedactorConfig, VaultBackend};
pub use entities::{EntityMatch, EntityType};
pub use error::{RedactorError, Result};
pub use redactor::{RedactResult, Redactor};
pub use rehydrator::StreamRehydrator;
pub use vault::{open_vault, MemoryVault, SqliteVault, Vault, VaultEntry};
