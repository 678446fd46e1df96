// End-to-end redaction behavior over the regex layer and the in-memory
// vault: exact tokenized output, round-trips, allow-list and skip-type
// filtering.

use std::collections::HashSet;
use std::sync::Arc;

use pii_redactor::config::{RedactorConfig, VaultBackend};
use pii_redactor::entities::EntityType;
use pii_redactor::redactor::Redactor;
use pii_redactor::vault::{MemoryVault, Vault};

fn regex_only_config() -> RedactorConfig {
    RedactorConfig {
        use_presidio: false,
        vault_backend: VaultBackend::Memory,
        ..RedactorConfig::default()
    }
}

fn build(config: &RedactorConfig) -> Redactor {
    let vault: Arc<dyn Vault> = Arc::new(MemoryVault::new());
    Redactor::from_config(config, vault).unwrap()
}

#[tokio::test]
async fn email_and_ssn_tokenize_exactly_and_round_trip() {
    let redactor = build(&regex_only_config());
    let input = "Email john@acme.com, SSN 123-45-6789";

    let result = redactor.redact("s1", input).await.unwrap();
    assert_eq!(result.text, "Email «EMAIL_001», SSN «SSN_001»");
    assert_eq!(result.token_count, 2);

    let restored = redactor.vault().rehydrate("s1", &result.text).unwrap();
    assert_eq!(restored, input);
}

#[tokio::test]
async fn redacted_text_contains_no_detected_value() {
    let redactor = build(&regex_only_config());
    let input = "john@acme.com paid with 4111-1111-1111-1111 from 10.0.0.7 \
                 (SSN 123-45-6789, born 1990-01-02)";

    let result = redactor.redact("s1", input).await.unwrap();
    for entity in &result.entities {
        assert!(
            !result.text.contains(&entity.text),
            "detected value {:?} leaked into output {:?}",
            entity.text,
            result.text
        );
    }
    assert_eq!(
        redactor.vault().rehydrate("s1", &result.text).unwrap(),
        input
    );
}

#[tokio::test]
async fn same_value_keeps_its_token_across_calls() {
    let redactor = build(&regex_only_config());

    let first = redactor.redact("s1", "from john@acme.com").await.unwrap();
    let second = redactor.redact("s1", "cc john@acme.com").await.unwrap();

    assert!(first.text.contains("«EMAIL_001»"));
    assert!(second.text.contains("«EMAIL_001»"));
}

#[tokio::test]
async fn distinct_phones_get_sequential_tokens() {
    let redactor = build(&regex_only_config());
    let input = "Call +1 234-567-8910 or 555-123-4567";

    let result = redactor.redact("s1", input).await.unwrap();
    assert!(result.text.contains("«PHONE_001»"));
    assert!(result.text.contains("«PHONE_002»"));
    assert_eq!(result.token_count, 2);

    let restored = redactor.vault().rehydrate("s1", &result.text).unwrap();
    assert_eq!(restored, input);
}

#[tokio::test]
async fn allow_listed_value_survives_verbatim() {
    let mut config = regex_only_config();
    config.allow_list = ["safe@ok.com".to_string()].into_iter().collect();
    let redactor = build(&config);

    let result = redactor
        .redact("s1", "mail safe@ok.com and a@b.co")
        .await
        .unwrap();

    assert_eq!(result.text, "mail safe@ok.com and «EMAIL_001»");
    assert_eq!(result.token_count, 1);
    assert_eq!(result.entities[0].text, "a@b.co");
}

#[tokio::test]
async fn skipped_types_are_never_tokenized() {
    let mut config = regex_only_config();
    config.skip_types = [EntityType::IpAddress].into_iter().collect();
    let redactor = build(&config);

    let result = redactor
        .redact("s1", "host 192.168.0.1 admin john@acme.com")
        .await
        .unwrap();

    assert!(result.text.contains("192.168.0.1"));
    assert!(!result.text.contains("IP_ADDRESS"));
    assert!(result.text.contains("«EMAIL_001»"));
}

#[tokio::test]
async fn sessions_do_not_share_tokens() {
    let redactor = build(&regex_only_config());

    let a = redactor.redact("alpha", "mail a@b.co").await.unwrap();
    let b = redactor.redact("beta", "mail z@y.io").await.unwrap();

    // both sessions number independently
    assert!(a.text.contains("«EMAIL_001»"));
    assert!(b.text.contains("«EMAIL_001»"));

    // alpha's token means nothing in beta
    let cross = redactor.vault().rehydrate("beta", &a.text).unwrap();
    assert!(cross.contains("«EMAIL_001»"));
}

#[tokio::test]
async fn unicode_text_around_pii_round_trips() {
    let redactor = build(&regex_only_config());
    let input = "Grüße von Zürich — schreib an jürgen@müller-gmbh.de? Nein: jurgen@acme.de läuft.";

    let result = redactor.redact("s1", input).await.unwrap();
    assert!(result.token_count >= 1);
    let restored = redactor.vault().rehydrate("s1", &result.text).unwrap();
    assert_eq!(restored, input);
}

#[tokio::test]
async fn custom_scanner_contributes_tokens() {
    let mut config = regex_only_config();
    config.custom_scanners = vec![pii_redactor::config::CustomScannerConfig {
        name: "employee-id".into(),
        pattern: r"EMP-\d{6}".into(),
        entity_type: "EMPLOYEE_ID".into(),
        score: 1.0,
    }];
    let redactor = build(&config);

    let result = redactor
        .redact("s1", "badge EMP-004521 belongs to john@acme.com")
        .await
        .unwrap();

    assert!(result.text.contains("«EMPLOYEE_ID_001»"));
    assert!(result.text.contains("«EMAIL_001»"));
    let restored = redactor.vault().rehydrate("s1", &result.text).unwrap();
    assert_eq!(restored, "badge EMP-004521 belongs to john@acme.com");
}

#[tokio::test]
async fn empty_and_clean_inputs_are_untouched() {
    let redactor = build(&regex_only_config());

    let result = redactor.redact("s1", "").await.unwrap();
    assert_eq!(result.text, "");
    assert_eq!(result.token_count, 0);

    let clean = "The quarterly report looks fine.";
    let result = redactor.redact("s1", clean).await.unwrap();
    assert_eq!(result.text, clean);
    assert!(result.entities.is_empty());
}

#[tokio::test]
async fn nested_secret_url_wins_over_embedded_email() {
    let redactor = build(&regex_only_config());
    let input = "fetch https://api.example.com/u?apikey=abc123&mail=joe@acme.com now";

    let result = redactor.redact("s1", input).await.unwrap();
    let types: HashSet<EntityType> = result
        .entities
        .iter()
        .map(|e| e.entity_type.clone())
        .collect();

    assert!(types.contains(&EntityType::UrlWithSecret));
    assert!(
        !types.contains(&EntityType::Email),
        "embedded email must collapse into the URL span"
    );
    assert_eq!(
        redactor.vault().rehydrate("s1", &result.text).unwrap(),
        input
    );
}
