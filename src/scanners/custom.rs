/// Config-time custom scanners.
///
/// Each entry in `custom_scanners` compiles to one of these; there is no
/// runtime plugin loading. Matches carry `source = "custom:<name>"`.
use async_trait::async_trait;
use regex::Regex;

use crate::config::CustomScannerConfig;
use crate::entities::{EntityMatch, EntityType};
use crate::error::{RedactorError, Result};
use crate::scanners::{char_span, Scanner};

pub struct CustomPatternScanner {
    name: String,
    source: String,
    pattern: Regex,
    entity_type: EntityType,
    score: f32,
}

impl CustomPatternScanner {
    pub fn from_config(config: &CustomScannerConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern).map_err(|e| {
            RedactorError::InvalidInput(format!(
                "custom scanner '{}' has an invalid pattern: {e}",
                config.name
            ))
        })?;
        Ok(Self {
            source: format!("custom:{}", config.name),
            name: config.name.clone(),
            pattern,
            entity_type: EntityType::from_tag(&config.entity_type),
            score: config.score.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl Scanner for CustomPatternScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, text: &str) -> Result<Vec<EntityMatch>> {
        let mut matches = Vec::new();
        for m in self.pattern.find_iter(text) {
            let (start, end) = char_span(text, m.start(), m.end());
            matches.push(EntityMatch {
                entity_type: self.entity_type.clone(),
                text: m.as_str().to_string(),
                start,
                end,
                score: self.score,
                source: self.source.clone(),
            });
        }
        Ok(matches)
    }
}
