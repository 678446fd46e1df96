/// Canonical PII entity categories and the textual token format.
///
/// Every detector in the system reports matches tagged with an `EntityType`;
/// the vault turns `(type, value)` pairs into opaque `«TYPE_NNN»` tokens.
use serde::{Deserialize, Serialize};

/// Closed set of PII categories, plus `Custom` for scanners registered at
/// config time. The textual name of each variant is what appears inside
/// tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Email,
    Phone,
    CreditCard,
    Ssn,
    IpAddress,
    DateOfBirth,
    AuTfn,
    AuMedicare,
    UrlWithSecret,
    ApiKey,
    Person,
    Organization,
    Location,
    Nrp,
    Url,
    DateTime,
    Custom(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Email => "EMAIL",
            EntityType::Phone => "PHONE",
            EntityType::CreditCard => "CREDIT_CARD",
            EntityType::Ssn => "SSN",
            EntityType::IpAddress => "IP_ADDRESS",
            EntityType::DateOfBirth => "DATE_OF_BIRTH",
            EntityType::AuTfn => "AU_TFN",
            EntityType::AuMedicare => "AU_MEDICARE",
            EntityType::UrlWithSecret => "URL_WITH_SECRET",
            EntityType::ApiKey => "API_KEY",
            EntityType::Person => "PERSON",
            EntityType::Organization => "ORGANIZATION",
            EntityType::Location => "LOCATION",
            EntityType::Nrp => "NRP",
            EntityType::Url => "URL",
            EntityType::DateTime => "DATE_TIME",
            EntityType::Custom(tag) => tag,
        }
    }

    /// Parse a detector-reported tag into the canonical set.
    ///
    /// NER engines use their own label vocabulary (Presidio's
    /// `EMAIL_ADDRESS`, spaCy-style `ORG`/`GPE`/`NORP`); those are
    /// normalized here. Unrecognized tags become `Custom` so config-time
    /// scanners can contribute their own categories.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "EMAIL" | "EMAIL_ADDRESS" => EntityType::Email,
            "PHONE" | "PHONE_NUMBER" => EntityType::Phone,
            "CREDIT_CARD" => EntityType::CreditCard,
            "SSN" | "US_SSN" => EntityType::Ssn,
            "IP_ADDRESS" => EntityType::IpAddress,
            "DATE_OF_BIRTH" => EntityType::DateOfBirth,
            "AU_TFN" => EntityType::AuTfn,
            "AU_MEDICARE" => EntityType::AuMedicare,
            "URL_WITH_SECRET" => EntityType::UrlWithSecret,
            "API_KEY" => EntityType::ApiKey,
            "PERSON" | "PER" => EntityType::Person,
            "ORGANIZATION" | "ORG" => EntityType::Organization,
            "LOCATION" | "LOC" | "GPE" => EntityType::Location,
            "NRP" | "NORP" => EntityType::Nrp,
            "URL" => EntityType::Url,
            "DATE_TIME" | "DATE" => EntityType::DateTime,
            other => EntityType::Custom(other.to_string()),
        }
    }
}

impl From<String> for EntityType {
    fn from(tag: String) -> Self {
        EntityType::from_tag(&tag)
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.as_str().to_string()
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected PII span. Offsets are half-open `[start, end)` character
/// offsets into the scanned text, never byte offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
    /// Which detector produced the span: "regex", "ner", or "custom:<name>".
    pub source: String,
}

impl EntityMatch {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Render the token for allocation number `number` of `entity_type`.
///
/// Counters are zero-padded to three digits and grow naturally past 999
/// («EMAIL_1000»). The guillemet delimiters never occur in redactable
/// content, which is what keeps tokens lexically distinguishable.
pub fn format_token(entity_type: &EntityType, number: u64) -> String {
    format!("«{}_{:03}»", entity_type.as_str(), number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format_pads_to_three_digits() {
        assert_eq!(format_token(&EntityType::Email, 1), "«EMAIL_001»");
        assert_eq!(format_token(&EntityType::Ssn, 42), "«SSN_042»");
        assert_eq!(format_token(&EntityType::CreditCard, 999), "«CREDIT_CARD_999»");
    }

    #[test]
    fn token_format_grows_past_three_digits() {
        assert_eq!(format_token(&EntityType::Email, 1000), "«EMAIL_1000»");
        assert_eq!(format_token(&EntityType::Phone, 12345), "«PHONE_12345»");
    }

    #[test]
    fn ner_tags_normalize_to_canonical_set() {
        assert_eq!(EntityType::from_tag("EMAIL_ADDRESS"), EntityType::Email);
        assert_eq!(EntityType::from_tag("PHONE_NUMBER"), EntityType::Phone);
        assert_eq!(EntityType::from_tag("US_SSN"), EntityType::Ssn);
        assert_eq!(EntityType::from_tag("ORG"), EntityType::Organization);
        assert_eq!(EntityType::from_tag("LOC"), EntityType::Location);
        assert_eq!(EntityType::from_tag("GPE"), EntityType::Location);
        assert_eq!(EntityType::from_tag("NORP"), EntityType::Nrp);
        assert_eq!(EntityType::from_tag("DATE"), EntityType::DateTime);
    }

    #[test]
    fn unknown_tags_become_custom() {
        let parsed = EntityType::from_tag("iban_code");
        assert_eq!(parsed, EntityType::Custom("IBAN_CODE".to_string()));
        assert_eq!(parsed.as_str(), "IBAN_CODE");
    }

    #[test]
    fn entity_type_serde_round_trips_as_string() {
        let json = serde_json::to_string(&EntityType::CreditCard).unwrap();
        assert_eq!(json, "\"CREDIT_CARD\"");
        let back: EntityType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityType::CreditCard);
    }
}
