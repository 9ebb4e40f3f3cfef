//! Integration tests for blindex with `FileMasterKey`.

use blindex::config::{Algorithm, FieldConfig};
use blindex::context::IndexContext;
use blindex::error::{Error, KeyProviderError};
use blindex::field::IndexedField;
use blindex::key::is_hex_key;
use blindex::master_key::{resolve_master_key, LazyMasterKey, MasterKeyResolver};
use blindex_key_file::FileMasterKey;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_init_writes_hex_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let resolver = FileMasterKey::init(temp_dir.path()).expect("Failed to initialize key");

    let contents = fs::read_to_string(resolver.key_path()).unwrap();
    assert!(contents.ends_with('\n'));
    assert!(is_hex_key(contents.trim_end()));
}

#[cfg(unix)]
#[test]
fn test_init_restricts_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let resolver = FileMasterKey::init(temp_dir.path()).unwrap();

    let mode = fs::metadata(resolver.key_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = FileMasterKey::init(temp_dir.path()).unwrap();
    let before = fs::read_to_string(first.key_path()).unwrap();

    let result = FileMasterKey::init(temp_dir.path());
    assert!(matches!(result, Err(KeyProviderError::AlreadyExists(_))));
    assert_eq!(fs::read_to_string(first.key_path()).unwrap(), before);
}

#[test]
fn test_init_creates_nested_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let key_dir = temp_dir.path().join("config").join("keys");

    FileMasterKey::init(&key_dir).unwrap();
    assert!(FileMasterKey::new(&key_dir).is_ok());
}

#[test]
fn test_resolve_round_trips_written_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let resolver = FileMasterKey::init(temp_dir.path()).unwrap();

    let written = fs::read_to_string(resolver.key_path()).unwrap();
    let key = resolve_master_key(&resolver).expect("Failed to resolve master key");
    assert_eq!(key.to_hex(), written.trim_end());
}

#[test]
fn test_hand_written_key_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("master.key"), format!("{}\n", "AB".repeat(32))).unwrap();

    let resolver = FileMasterKey::new(temp_dir.path()).unwrap();
    let key = resolve_master_key(&resolver).unwrap();
    assert_eq!(key.expose(), &[0xab; 32]);
}

#[test]
fn test_malformed_key_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("master.key"), "not-a-key\n").unwrap();

    let resolver = FileMasterKey::new(temp_dir.path()).unwrap();
    assert!(matches!(resolve_master_key(&resolver), Err(Error::InvalidMasterKey(_))));
}

#[test]
fn test_missing_key_file_is_missing_master_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let resolver = FileMasterKey::new(temp_dir.path()).unwrap();

    assert!(matches!(resolver.resolve(), Err(KeyProviderError::NotFound(_))));
    assert!(matches!(resolve_master_key(&resolver), Err(Error::MissingMasterKey)));
}

#[test]
fn test_blind_index_with_file_master_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let resolver = FileMasterKey::init(temp_dir.path()).unwrap();

    let field = IndexedField::new(
        IndexContext::new("users", "email_bidx"),
        FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256),
        LazyMasterKey::new(resolver),
    );

    let index1 = field.compute(Some("alice@example.com".into())).unwrap().unwrap();
    let index2 = field.compute(Some("alice@example.com".into())).unwrap().unwrap();
    let other = field.compute(Some("bob@example.com".into())).unwrap().unwrap();

    assert_eq!(index1, index2);
    assert_ne!(index1, other);
    assert_eq!(index1.as_text().unwrap().len(), 44);
}

#[test]
fn test_key_file_matches_literal_master_key() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("master.key"), "0".repeat(64)).unwrap();

    let resolver = FileMasterKey::new(temp_dir.path()).unwrap();
    let field = IndexedField::new(
        IndexContext::new("users", "email_bidx"),
        FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256),
        resolver,
    );

    let key = field.index_key().unwrap().unwrap();
    assert_eq!(key.to_hex(), "289737bab72fa97b1f4b081cef00d7b7d75034bcf3183c363feaf3e6441777bc");
}
