use std::fs;

use assert_matches::assert_matches;

use marine_portal::config::{ConfigLoader, StorageConfig};
use marine_portal::error::PortalError;

#[test]
fn resolve_reads_an_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "storage": {"backend": "file", "path": "/srv/portal"},
            "certificate_threshold": 10,
            "upload_chunk_size": 250,
            "admin_email": "desk@example.org"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(
        resolved.storage,
        StorageConfig::File {
            path: Some("/srv/portal".into())
        }
    );
    assert_eq!(resolved.certificate_threshold, 10);
    assert_eq!(resolved.upload_chunk_size, 250);
    assert_eq!(resolved.min_purpose_chars, 5);
    assert_eq!(resolved.admin_email.unwrap().as_str(), "desk@example.org");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(PortalError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ storage: ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(PortalError::ConfigParse(_))
    );
}

#[test]
fn memory_backend_and_bad_admin_email() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.json");
    fs::write(&path, r#"{"storage": {"backend": "memory"}}"#).unwrap();
    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.storage, StorageConfig::Memory);

    fs::write(&path, r#"{"admin_email": "nobody"}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(PortalError::InvalidEmail(_))
    );
}
