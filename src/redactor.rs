/// The redaction pipeline: scanners → span resolver → vault substitution.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RedactorConfig;
use crate::entities::{EntityMatch, EntityType};
use crate::error::{RedactorError, Result};
use crate::resolver::resolve_spans;
use crate::scanners::{CustomPatternScanner, PresidioScanner, RegexScanner, Scanner, ScannerRegistry};
use crate::vault::Vault;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactResult {
    pub text: String,
    pub entities: Vec<EntityMatch>,
    pub token_count: usize,
}

pub struct Redactor {
    registry: ScannerRegistry,
    vault: Arc<dyn Vault>,
    skip_types: HashSet<EntityType>,
    allow_list: HashSet<String>,
    presidio: Option<Arc<PresidioScanner>>,
}

impl Redactor {
    /// Build the scanner stack described by the configuration. Scanners are
    /// immutable from here on.
    pub fn from_config(config: &RedactorConfig, vault: Arc<dyn Vault>) -> Result<Self> {
        let mut registry = ScannerRegistry::new();
        registry.register(Arc::new(RegexScanner::new()));

        let presidio = if config.use_presidio {
            let scanner = Arc::new(PresidioScanner::new(
                &config.language,
                config.score_threshold,
                &config.entities,
            ));
            registry.register(Arc::clone(&scanner) as Arc<dyn Scanner>);
            Some(scanner)
        } else {
            None
        };

        for custom in &config.custom_scanners {
            registry.register(Arc::new(CustomPatternScanner::from_config(custom)?));
        }

        Ok(Self {
            registry,
            vault,
            skip_types: config.skip_types.clone(),
            allow_list: config.allow_list.clone(),
            presidio,
        })
    }

    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    /// Number of scanners in the detection stack.
    pub fn scanner_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the NER layer is configured and warm.
    pub async fn ner_ready(&self) -> bool {
        match &self.presidio {
            Some(scanner) => scanner.is_ready().await,
            None => false,
        }
    }

    /// Stop any helper process the NER layer started.
    pub async fn shutdown(&self) {
        if let Some(scanner) = &self.presidio {
            scanner.shutdown().await;
        }
    }

    /// Redact one text: detect, resolve, and re-emit with tokens in place of
    /// every resolved span.
    pub async fn redact(&self, session: &str, text: &str) -> Result<RedactResult> {
        let found = self.registry.scan_all(text).await;
        let mut resolved = resolve_spans(found, &self.skip_types, &self.allow_list)?;

        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;

        for m in &mut resolved {
            if m.start < cursor || m.end > chars.len() {
                return Err(RedactorError::Protocol(format!(
                    "resolved span out of bounds: {m:?} (cursor {cursor}, len {})",
                    chars.len()
                )));
            }
            out.extend(chars[cursor..m.start].iter());

            // The input slice is authoritative; scanner-reported text could
            // drift from it and the vault must store what gets replaced.
            let original: String = chars[m.start..m.end].iter().collect();
            m.text = original.clone();

            let token = self
                .vault
                .get_or_create_token(session, &m.entity_type, &original)?;
            out.push_str(&token);
            cursor = m.end;
        }
        out.extend(chars[cursor..].iter());

        let token_count = resolved.len();
        Ok(RedactResult {
            text: out,
            entities: resolved,
            token_count,
        })
    }

    /// Redact a conversation payload. Only `user` messages and `tool`
    /// results carry user-originated content; system and assistant messages
    /// pass through unmodified.
    pub async fn redact_messages(&self, session: &str, messages: Vec<Value>) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(messages.len());
        for mut message in messages {
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if role == "user" || role == "tool" {
                if let Some(content) = message.get_mut("content") {
                    self.redact_content(session, content).await?;
                }
            }
            out.push(message);
        }
        Ok(out)
    }

    /// Content is either a plain string or a list of parts with `text`
    /// fields; anything else is left alone.
    async fn redact_content(&self, session: &str, content: &mut Value) -> Result<()> {
        match content {
            Value::String(text) => {
                let result = self.redact(session, text).await?;
                *text = result.text;
            }
            Value::Array(parts) => {
                for part in parts {
                    if let Some(Value::String(text)) = part.get_mut("text") {
                        let result = self.redact(session, text).await?;
                        *text = result.text;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
