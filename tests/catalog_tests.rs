use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;

use reposeer::catalog::{CatalogError, CatalogLoader, CsvLoader, SqliteLoader};
use reposeer::hasher::hash_bytes;
use reposeer::{HashAlgorithm, ProgressReporter, SilentReporter};

const HASH_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";
const HASH_EMPTY: &str = "d41d8cd98f00b204e9800998ecf8427e";

fn write_csv(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("libgen.csv");
    fs::write(&path, content).unwrap();
    path
}

#[derive(Default)]
struct LoadEvents {
    started: Mutex<Option<Option<u64>>>,
    loaded: Mutex<Option<usize>>,
}

impl ProgressReporter for LoadEvents {
    fn on_catalog_start(&self, total_rows: Option<u64>) {
        *self.started.lock().unwrap() = Some(total_rows);
    }
    fn on_catalog_loaded(&self, entries: usize, _duration_secs: f64) {
        *self.loaded.lock().unwrap() = Some(entries);
    }
}

#[test]
fn test_csv_with_header() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        &format!(
            "filename,filesize,md5\nbooks/a.txt,3,{}\n\"with, comma.txt\",0,{}\n",
            HASH_ABC, HASH_EMPTY
        ),
    );

    let events = LoadEvents::default();
    let catalog = CsvLoader::new(&path, HashAlgorithm::Md5).load(&events).unwrap();

    assert_eq!(catalog.len(), 2);
    let a = catalog.lookup(HASH_ABC).unwrap();
    assert_eq!(a.canonical_path, PathBuf::from("books").join("a.txt"));
    assert_eq!(a.size_bytes, 3);
    assert_eq!(
        catalog.lookup(HASH_EMPTY).unwrap().canonical_path,
        PathBuf::from("with, comma.txt")
    );
    assert!(catalog.contains_size(0));
    assert!(!catalog.contains_size(4));
    assert_eq!(*events.started.lock().unwrap(), Some(Some(3)));
    assert_eq!(*events.loaded.lock().unwrap(), Some(2));
}

#[test]
fn test_csv_without_header_and_uppercase_hash() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        &format!("a.txt,3,{}\n", HASH_ABC.to_ascii_uppercase()),
    );

    let catalog = CsvLoader::new(&path, HashAlgorithm::Md5)
        .load(&SilentReporter)
        .unwrap();
    assert_eq!(catalog.len(), 1, "first row is data when its size parses");
    assert!(catalog.lookup(HASH_ABC).is_some(), "hashes are lower-cased");
}

#[test]
fn test_csv_duplicate_hash_last_row_wins() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        &format!("old/a.txt,3,{h}\nnew/a.txt,3,{h}\n", h = HASH_ABC),
    );

    let catalog = CsvLoader::new(&path, HashAlgorithm::Md5)
        .load(&SilentReporter)
        .unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog.lookup(HASH_ABC).unwrap().canonical_path,
        PathBuf::from("new").join("a.txt")
    );
}

#[test]
fn test_csv_malformed_rows_abort_load() {
    let dir = tempdir().unwrap();

    let short = write_csv(dir.path(), &format!("a.txt,3,{}\nb.txt,4\n", HASH_ABC));
    match CsvLoader::new(&short, HashAlgorithm::Md5).load(&SilentReporter) {
        Err(CatalogError::MalformedRow { line, .. }) => assert_eq!(line, 2),
        other => panic!("Expected malformed row, got {:?}", other.map(|c| c.len())),
    }

    let bad_size = write_csv(dir.path(), &format!("a.txt,3,{}\nb.txt,-4,{}\n", HASH_ABC, HASH_ABC));
    assert!(matches!(
        CsvLoader::new(&bad_size, HashAlgorithm::Md5).load(&SilentReporter),
        Err(CatalogError::MalformedRow { .. })
    ));
}

#[test]
fn test_csv_invalid_hash_is_rejected() {
    let dir = tempdir().unwrap();
    let path = write_csv(dir.path(), "a.txt,3,not-a-hash\n");
    assert!(matches!(
        CsvLoader::new(&path, HashAlgorithm::Md5).load(&SilentReporter),
        Err(CatalogError::InvalidHash { line: 1, .. })
    ));

    let path = write_csv(dir.path(), &format!("a.txt,3,{}\n", HASH_ABC));
    assert!(
        matches!(
            CsvLoader::new(&path, HashAlgorithm::Blake3).load(&SilentReporter),
            Err(CatalogError::InvalidHash { .. })
        ),
        "an md5 digest is not a blake3 digest"
    );
}

#[test]
fn test_csv_path_escaping_destination_is_rejected() {
    let dir = tempdir().unwrap();
    for name in ["../outside.txt", "/etc/passwd", "a/../../b"] {
        let path = write_csv(dir.path(), &format!("{},3,{}\n", name, HASH_ABC));
        assert!(
            matches!(
                CsvLoader::new(&path, HashAlgorithm::Md5).load(&SilentReporter),
                Err(CatalogError::UnsafePath { .. })
            ),
            "{} should be rejected",
            name
        );
    }
}

#[test]
fn test_missing_catalog_is_not_found() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    assert!(matches!(
        CsvLoader::new(&missing, HashAlgorithm::Md5).load(&SilentReporter),
        Err(CatalogError::NotFound(p)) if p == missing
    ));
    assert!(matches!(
        SqliteLoader::new(&missing, HashAlgorithm::Md5).load(&SilentReporter),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn test_blake3_catalog() {
    let dir = tempdir().unwrap();
    let hash = hash_bytes(HashAlgorithm::Blake3, b"abc");
    let path = write_csv(dir.path(), &format!("a.txt,3,{}\n", hash));

    let catalog = CsvLoader::new(&path, HashAlgorithm::Blake3)
        .load(&SilentReporter)
        .unwrap();
    assert_eq!(catalog.algorithm(), HashAlgorithm::Blake3);
    assert!(catalog.lookup(&hash).is_some());
}

fn create_libgen_db(path: &Path, rows: &[(&str, i64, &str)]) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute(
        "CREATE TABLE updated (Filename TEXT, Filesize INTEGER, MD5 TEXT)",
        [],
    )
    .unwrap();
    for (name, size, hash) in rows {
        conn.execute(
            "INSERT INTO updated (Filename, Filesize, MD5) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, size, hash],
        )
        .unwrap();
    }
}

#[test]
fn test_sqlite_default_query_skips_empty_names() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("libgen.db");
    create_libgen_db(
        &db,
        &[("books/a.txt", 3, HASH_ABC), ("", 0, HASH_EMPTY)],
    );

    let events = LoadEvents::default();
    let catalog = SqliteLoader::new(&db, HashAlgorithm::Md5).load(&events).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog.lookup(HASH_ABC).unwrap().canonical_path,
        PathBuf::from("books").join("a.txt")
    );
    assert_eq!(*events.started.lock().unwrap(), Some(None));
    assert_eq!(*events.loaded.lock().unwrap(), Some(1));
}

#[test]
fn test_sqlite_custom_query_and_negative_size() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("libgen.db");
    create_libgen_db(&db, &[("a.txt", 3, HASH_ABC), ("bad.txt", -1, HASH_EMPTY)]);

    let catalog = SqliteLoader::new(&db, HashAlgorithm::Md5)
        .with_query("SELECT Filename, Filesize, MD5 FROM updated WHERE Filesize >= 0")
        .load(&SilentReporter)
        .unwrap();
    assert_eq!(catalog.len(), 1);

    assert!(matches!(
        SqliteLoader::new(&db, HashAlgorithm::Md5).load(&SilentReporter),
        Err(CatalogError::MalformedRow { line: 2, .. })
    ));
}
