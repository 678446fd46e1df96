/// Detection layer: the `Scanner` trait and the registry that fans input out
/// to every enabled scanner.
///
/// Scanners are constructed at startup and stateless across calls. A scanner
/// that fails contributes nothing for that call; the others still run.
pub mod custom;
pub mod presidio;
pub mod regex_scanner;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::warn;

use crate::entities::EntityMatch;
use crate::error::Result;

pub use custom::CustomPatternScanner;
pub use presidio::PresidioScanner;
pub use regex_scanner::RegexScanner;

/// A PII detector. Implementations must report half-open `[start, end)`
/// spans in character offsets relative to the input, and must not mutate
/// shared state.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn name(&self) -> &str;
    async fn scan(&self, text: &str) -> Result<Vec<EntityMatch>>;
}

/// Invokes all enabled scanners on the same input and concatenates their
/// results. Per-scanner failures are absorbed here.
pub struct ScannerRegistry {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self { scanners: Vec::new() }
    }

    pub fn register(&mut self, scanner: Arc<dyn Scanner>) {
        self.scanners.push(scanner);
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Run every scanner concurrently and collect the union of their spans.
    pub async fn scan_all(&self, text: &str) -> Vec<EntityMatch> {
        if self.scanners.is_empty() {
            return Vec::new();
        }

        let futures = self.scanners.iter().map(|s| s.scan(text));
        let results = join_all(futures).await;

        let mut matches = Vec::new();
        for (scanner, result) in self.scanners.iter().zip(results) {
            match result {
                Ok(found) => matches.extend(found),
                Err(e) => {
                    warn!(scanner = scanner.name(), error = %e,
                          "scanner failed; continuing without its output");
                }
            }
        }
        matches
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a byte span produced by the `regex` crate into the character
/// span the rest of the pipeline speaks. For ASCII input the two coincide.
pub(crate) fn char_span(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    if text.is_ascii() {
        return (byte_start, byte_end);
    }
    let start = text[..byte_start].chars().count();
    let len = text[byte_start..byte_end].chars().count();
    (start, start + len)
}
