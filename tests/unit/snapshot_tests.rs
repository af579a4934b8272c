//! Snapshot files on disk

use std::fs;

use rust_sqlmigrate::snapshot::{fingerprint, read_snapshot, write_snapshot};
use rust_sqlmigrate::MigrationError;
use tempfile::TempDir;

use crate::common::{blog_model, people_model};

#[test]
fn test_snapshot_file_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blog.xml");
    let model = blog_model();

    write_snapshot(&model, &path).unwrap();
    assert_eq!(read_snapshot(&path).unwrap(), model);
}

#[test]
fn test_fingerprint_is_stable_and_content_sensitive() {
    let first = fingerprint(&people_model()).unwrap();
    assert_eq!(first, fingerprint(&people_model()).unwrap());
    assert_eq!(first.len(), 64);
    assert_ne!(first, fingerprint(&blog_model()).unwrap());
}

#[test]
fn test_windows_1252_snapshot_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.xml");
    let mut bytes = b"<SchemaSnapshot><Model><Table Id=\"T\" Name=\"T\" Comment=\"Caf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"\"><Column Id=\"A\" Name=\"A\" Type=\"Int32\"/></Table></Model></SchemaSnapshot>");
    fs::write(&path, bytes).unwrap();

    let model = read_snapshot(&path).unwrap();
    assert_eq!(model.tables[0].comment.as_deref(), Some("Café"));
}

#[test]
fn test_missing_snapshot_file() {
    let err = read_snapshot(std::path::Path::new("/nonexistent/snapshot.xml")).unwrap_err();
    assert!(matches!(err, MigrationError::SnapshotReadError { .. }));
}
