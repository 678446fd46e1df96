// SQLite backend semantics: durability across reopen, counter persistence,
// session management, and allocation races through the pool.

use std::sync::Arc;

use pii_redactor::entities::EntityType;
use pii_redactor::vault::{SqliteVault, Vault};
use tempfile::TempDir;

fn vault_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("vault.db")
}

#[test]
fn tokens_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);

    {
        let vault = SqliteVault::open(&path).unwrap();
        let token = vault
            .get_or_create_token("s1", &EntityType::Email, "john@acme.com")
            .unwrap();
        assert_eq!(token, "«EMAIL_001»");
    }

    let vault = SqliteVault::open(&path).unwrap();
    assert_eq!(
        vault.resolve_token("s1", "«EMAIL_001»").unwrap().as_deref(),
        Some("john@acme.com")
    );

    let rehydrated = (&vault as &dyn Vault)
        .rehydrate("s1", "reply to «EMAIL_001» today")
        .unwrap();
    assert_eq!(rehydrated, "reply to john@acme.com today");
}

#[test]
fn counters_continue_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);

    {
        let vault = SqliteVault::open(&path).unwrap();
        vault
            .get_or_create_token("s1", &EntityType::Email, "first@acme.com")
            .unwrap();
    }

    let vault = SqliteVault::open(&path).unwrap();
    let token = vault
        .get_or_create_token("s1", &EntityType::Email, "second@acme.com")
        .unwrap();
    assert_eq!(token, "«EMAIL_002»", "counter must not restart after reopen");
}

#[test]
fn allocation_is_idempotent_and_typed() {
    let dir = TempDir::new().unwrap();
    let vault = SqliteVault::open(&vault_path(&dir)).unwrap();

    let a = vault
        .get_or_create_token("s1", &EntityType::Phone, "555-123-4567")
        .unwrap();
    let b = vault
        .get_or_create_token("s1", &EntityType::Phone, "555-123-4567")
        .unwrap();
    assert_eq!(a, b);

    let ssn = vault
        .get_or_create_token("s1", &EntityType::Ssn, "123-45-6789")
        .unwrap();
    assert_eq!(ssn, "«SSN_001»", "counters are per entity type");
}

#[test]
fn dump_preserves_entries_in_allocation_order() {
    let dir = TempDir::new().unwrap();
    let vault = SqliteVault::open(&vault_path(&dir)).unwrap();

    vault
        .get_or_create_token("s1", &EntityType::Email, "a@b.co")
        .unwrap();
    vault
        .get_or_create_token("s1", &EntityType::Ssn, "123-45-6789")
        .unwrap();
    vault
        .get_or_create_token("other", &EntityType::Email, "z@y.io")
        .unwrap();

    let entries = vault.dump("s1").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].token, "«EMAIL_001»");
    assert_eq!(entries[0].original_value, "a@b.co");
    assert_eq!(entries[0].entity_type, EntityType::Email);
    assert_eq!(entries[0].session_id, "s1");
    assert_eq!(entries[1].token, "«SSN_001»");
}

#[test]
fn sessions_are_listed_and_deleted() {
    let dir = TempDir::new().unwrap();
    let vault = SqliteVault::open(&vault_path(&dir)).unwrap();

    vault
        .get_or_create_token("alpha", &EntityType::Email, "a@b.co")
        .unwrap();
    vault
        .get_or_create_token("beta", &EntityType::Email, "b@c.de")
        .unwrap();

    assert_eq!(vault.list_sessions().unwrap(), vec!["alpha", "beta"]);

    vault.delete_session("alpha").unwrap();
    assert_eq!(vault.list_sessions().unwrap(), vec!["beta"]);
    assert_eq!(vault.resolve_token("alpha", "«EMAIL_001»").unwrap(), None);
    assert!(vault.dump("alpha").unwrap().is_empty());
}

#[test]
fn session_isolation_holds_in_sqlite() {
    let dir = TempDir::new().unwrap();
    let vault = SqliteVault::open(&vault_path(&dir)).unwrap();

    let a = vault
        .get_or_create_token("alpha", &EntityType::Email, "a@b.co")
        .unwrap();
    assert_eq!(vault.resolve_token("beta", &a).unwrap(), None);
}

#[test]
fn concurrent_allocations_of_one_value_agree() {
    let dir = TempDir::new().unwrap();
    let vault = Arc::new(SqliteVault::open(&vault_path(&dir)).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let vault = Arc::clone(&vault);
        handles.push(std::thread::spawn(move || {
            vault
                .get_or_create_token("s1", &EntityType::Email, "john@acme.com")
                .unwrap()
        }));
    }

    let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(tokens.iter().all(|t| t == "«EMAIL_001»"));

    // the race must not have burned extra numbers for the losers
    let next = vault
        .get_or_create_token("s1", &EntityType::Email, "new@acme.com")
        .unwrap();
    assert_eq!(next, "«EMAIL_002»");
}

#[test]
fn missing_parent_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("deep").join("nested").join("vault.db");
    let vault = SqliteVault::open(&nested).unwrap();
    vault
        .get_or_create_token("s1", &EntityType::Email, "a@b.co")
        .unwrap();
    assert!(nested.exists());
}
