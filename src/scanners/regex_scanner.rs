/// Pattern-based detection for well-formed PII.
///
/// The zero-dependency floor of the detection engine: a fixed, ordered
/// catalogue of compiled patterns that works with the NER layer disabled.
/// All matches are deterministic and score 1.0.
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::entities::{EntityMatch, EntityType};
use crate::error::Result;
use crate::scanners::{char_span, Scanner};

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_PATTERN: Regex = Regex::new(
        r"\+?\d{1,3}[-.\s]\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b|\(\d{3}\)[-.\s]?\d{3}[-.\s]?\d{4}\b|\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b"
    )
    .unwrap();
    static ref CREDIT_CARD_PATTERN: Regex = Regex::new(r"\b\d(?:[-\s]?\d){12,18}\b").unwrap();
    static ref SSN_PATTERN: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
    static ref IP_PATTERN: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b"
    )
    .unwrap();
    static ref DATE_OF_BIRTH_PATTERN: Regex = Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap();
    static ref AU_TFN_PATTERN: Regex = Regex::new(r"\b\d{3} \d{3} \d{3}\b").unwrap();
    static ref AU_MEDICARE_PATTERN: Regex = Regex::new(r"\b\d{4} \d{5} \d\b").unwrap();
    static ref URL_WITH_SECRET_PATTERN: Regex = Regex::new(
        r"(?i)\bhttps?://[^\s]*[?&](?:key|token|secret|apikey)=[^\s]+"
    )
    .unwrap();
    static ref API_KEY_PATTERN: Regex = Regex::new(
        r"(?i)\b(?:api[_-]?key|token|secret)\s*[=:]\s*[A-Za-z0-9_\-]{16,}"
    )
    .unwrap();
}

pub struct RegexScanner;

impl RegexScanner {
    pub fn new() -> Self {
        Self
    }

    fn catalogue() -> [(&'static Regex, EntityType); 10] {
        [
            (&*URL_WITH_SECRET_PATTERN, EntityType::UrlWithSecret),
            (&*API_KEY_PATTERN, EntityType::ApiKey),
            (&*EMAIL_PATTERN, EntityType::Email),
            (&*CREDIT_CARD_PATTERN, EntityType::CreditCard),
            (&*SSN_PATTERN, EntityType::Ssn),
            (&*PHONE_PATTERN, EntityType::Phone),
            (&*IP_PATTERN, EntityType::IpAddress),
            (&*DATE_OF_BIRTH_PATTERN, EntityType::DateOfBirth),
            (&*AU_TFN_PATTERN, EntityType::AuTfn),
            (&*AU_MEDICARE_PATTERN, EntityType::AuMedicare),
        ]
    }

    /// Luhn checksum over the digit run. Candidates that fail are not
    /// credit cards and are skipped entirely.
    fn is_valid_credit_card(candidate: &str) -> bool {
        let digits: Vec<u32> = candidate
            .chars()
            .filter(|c| c.is_ascii_digit())
            .filter_map(|c| c.to_digit(10))
            .collect();

        if digits.len() < 13 || digits.len() > 19 {
            return false;
        }

        let mut sum = 0;
        let mut alternate = false;
        for digit in digits.iter().rev() {
            let mut d = *digit;
            if alternate {
                d *= 2;
                if d > 9 {
                    d -= 9;
                }
            }
            sum += d;
            alternate = !alternate;
        }
        sum % 10 == 0
    }
}

impl Default for RegexScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for RegexScanner {
    fn name(&self) -> &str {
        "regex"
    }

    async fn scan(&self, text: &str) -> Result<Vec<EntityMatch>> {
        let mut matches = Vec::new();

        for (pattern, entity_type) in Self::catalogue() {
            for m in pattern.find_iter(text) {
                if entity_type == EntityType::CreditCard && !Self::is_valid_credit_card(m.as_str())
                {
                    continue;
                }
                let (start, end) = char_span(text, m.start(), m.end());
                matches.push(EntityMatch {
                    entity_type: entity_type.clone(),
                    text: m.as_str().to_string(),
                    start,
                    end,
                    score: 1.0,
                    source: "regex".to_string(),
                });
            }
        }

        Ok(matches)
    }
}
