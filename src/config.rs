/// Typed configuration for the redaction sidecar.
///
/// Built inline, loaded from a TOML file, or both; environment variables
/// override either. Configuration is immutable for the process lifetime.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::{DEFAULT_LANGUAGE, DEFAULT_PORT, DEFAULT_SCORE_THRESHOLD, VAULT_DB_FILENAME};
use crate::entities::EntityType;
use crate::error::{RedactorError, Result};

pub const ENV_NO_PRESIDIO: &str = "PII_REDACTOR_NO_PRESIDIO";
pub const ENV_THRESHOLD: &str = "PII_REDACTOR_THRESHOLD";
pub const ENV_DB: &str = "PII_REDACTOR_DB";
pub const ENV_PORT: &str = "PII_REDACTOR_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    Memory,
    Sqlite,
}

impl VaultBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultBackend::Memory => "memory",
            VaultBackend::Sqlite => "sqlite",
        }
    }
}

/// A config-time regex scanner. Compiled once at startup; contributes
/// matches under `source = "custom:<name>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomScannerConfig {
    pub name: String,
    pub pattern: String,
    pub entity_type: String,
    #[serde(default = "default_custom_score")]
    pub score: f32,
}

fn default_custom_score() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactorConfig {
    /// Enable the NER layer. The regex layer always runs.
    pub use_presidio: bool,
    /// Language tag passed to the NER analyzer.
    pub language: String,
    /// Minimum NER confidence; matches below are discarded.
    pub score_threshold: f32,
    /// NER entity whitelist in the analyzer's own vocabulary. Empty means
    /// the analyzer defaults.
    pub entities: Vec<String>,
    /// Entity types never redacted, applied after detection.
    pub skip_types: HashSet<EntityType>,
    /// Literal values never redacted, applied after detection.
    pub allow_list: HashSet<String>,
    /// Ordered list of config-time custom scanners.
    pub custom_scanners: Vec<CustomScannerConfig>,
    pub vault_backend: VaultBackend,
    /// Filesystem path for the persistent backend. Defaults to the
    /// platform's local data directory.
    pub vault_path: Option<PathBuf>,
    /// Loopback port for `serve`.
    pub port: u16,
}

impl Default for RedactorConfig {
    fn default() -> Self {
        Self {
            use_presidio: true,
            language: DEFAULT_LANGUAGE.to_string(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            entities: Vec::new(),
            skip_types: HashSet::new(),
            allow_list: HashSet::new(),
            custom_scanners: Vec::new(),
            vault_backend: VaultBackend::Sqlite,
            vault_path: None,
            port: DEFAULT_PORT,
        }
    }
}

impl RedactorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RedactorError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| RedactorError::InvalidInput(format!("malformed config: {e}")))
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// `PII_REDACTOR_*` variables override whatever the file said. Values
    /// that fail to parse are logged and ignored rather than taking the
    /// process down.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(ENV_NO_PRESIDIO) {
            if v == "1" || v.eq_ignore_ascii_case("true") {
                self.use_presidio = false;
            }
        }
        if let Ok(v) = std::env::var(ENV_THRESHOLD) {
            match v.parse::<f32>() {
                Ok(t) if (0.0..=1.0).contains(&t) => self.score_threshold = t,
                _ => warn!(value = %v, "ignoring unparsable {ENV_THRESHOLD}"),
            }
        }
        if let Ok(v) = std::env::var(ENV_DB) {
            if !v.is_empty() {
                self.vault_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = std::env::var(ENV_PORT) {
            match v.parse::<u16>() {
                Ok(p) => self.port = p,
                Err(_) => warn!(value = %v, "ignoring unparsable {ENV_PORT}"),
            }
        }
    }

    /// Where the persistent vault lives when no explicit path was given.
    pub fn resolve_vault_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.vault_path {
            return Ok(path.clone());
        }
        let mut path = dirs::data_local_dir().ok_or_else(|| {
            RedactorError::VaultUnavailable("no local data directory on this platform".into())
        })?;
        path.push("pii-redactor");
        path.push(VAULT_DB_FILENAME);
        Ok(path)
    }
}
