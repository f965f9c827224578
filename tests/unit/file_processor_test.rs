// tests/unit/file_processor_test.rs
//! Unit tests for the file processor - collaborators are mocked

use activity_sink::models::internal::{
    Category, ImportOutcome, ImportRequest, ImportedRecord, Owner, ResolutionOutcome,
};
use activity_sink::services::address::AddressParser;
use activity_sink::services::file_processor::{FileProcessor, ResolutionError};
use activity_sink::services::import_client::{ImportError, Importer};
use activity_sink::storage::directory::{CategoryDirectory, DirectoryError, OwnerDirectory};
use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::*;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

mock! {
    pub Owners {}

    #[async_trait]
    impl OwnerDirectory for Owners {
        async fn find_owner(&self, name: &str) -> Result<Option<Owner>, DirectoryError>;
    }
}

mock! {
    pub Categories {}

    #[async_trait]
    impl CategoryDirectory for Categories {
        async fn find_category(&self, id: i64) -> Result<Option<Category>, DirectoryError>;
    }
}

mock! {
    pub Import {}

    #[async_trait]
    impl Importer for Import {
        async fn import_file(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError>;
        async fn rollback(&self);
    }
}

// ============================================
// Test Data Factories
// ============================================

fn owner(name: &str, suspended: bool) -> Owner {
    Owner {
        name: name.to_string(),
        suspended,
    }
}

fn category(id: i64) -> Category {
    Category {
        id,
        label: format!("Sport {}", id),
    }
}

fn record(id: &str) -> ImportedRecord {
    ImportedRecord {
        id: id.to_string(),
        label: "Morning Ride".to_string(),
    }
}

/// Writes `content` at `{tmp}/sink/{relative}` and returns the absolute path.
fn drop_file(dir: &TempDir, relative: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join("sink").join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn processor(owners: MockOwners, categories: MockCategories, importer: MockImport) -> FileProcessor {
    FileProcessor::new(
        AddressParser::new("sink", 1),
        Arc::new(owners),
        Arc::new(categories),
        Arc::new(importer),
        "Imported from sink folder",
    )
}

fn known_owner(name: &'static str, suspended: bool) -> MockOwners {
    let mut owners = MockOwners::new();
    owners
        .expect_find_owner()
        .with(eq(name))
        .times(1)
        .returning(move |n| Ok(Some(owner(n, suspended))));
    owners
}

fn known_category(id: i64) -> MockCategories {
    let mut categories = MockCategories::new();
    categories
        .expect_find_category()
        .with(eq(id))
        .times(1)
        .returning(|id| Ok(Some(category(id))));
    categories
}

fn assert_errored(outcome: &ResolutionOutcome, expected_owner: &str, expected_message: &str) {
    match outcome {
        ResolutionOutcome::Errored { owner, error } => {
            assert_eq!(owner, expected_owner);
            assert!(
                error.to_string().contains(expected_message),
                "unexpected message: {}",
                error
            );
        }
        other => panic!("expected Errored, got {:?}", other),
    }
}

// ============================================
// Success Path
// ============================================

#[tokio::test]
async fn test_process_default_category_success() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "alice/run.gpx", b"<gpx/>");

    let mut importer = MockImport::new();
    importer
        .expect_import_file()
        .withf(|req| {
            req.owner.name == "alice"
                && req.category.id == 1
                && req.upload.filename() == "run.gpx"
                && req.upload.read_all() == b"<gpx/>"
                && req.note == "Imported from sink folder"
        })
        .times(1)
        .returning(|_| Ok(ImportOutcome::created(vec![record("w1"), record("w2")])));

    let outcome = processor(known_owner("alice", false), known_category(1), importer)
        .process(&path)
        .await;

    match outcome {
        ResolutionOutcome::Processed { owner, record } => {
            assert_eq!(owner, "alice");
            assert_eq!(record.id, "w1");
        }
        other => panic!("expected Processed, got {:?}", other),
    }
    // The processor never moves files itself
    assert!(path.exists());
}

#[tokio::test]
async fn test_process_uses_category_from_path() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "bob/4/ride.fit", b"fit");

    let mut importer = MockImport::new();
    importer
        .expect_import_file()
        .withf(|req| req.category.id == 4)
        .times(1)
        .returning(|_| Ok(ImportOutcome::created(vec![record("w9")])));

    let outcome = processor(known_owner("bob", false), known_category(4), importer)
        .process(&path)
        .await;

    assert!(outcome.is_processed());
}

// ============================================
// Lookup and Eligibility Failures
// ============================================

#[tokio::test]
async fn test_process_unknown_owner() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "unknownuser/x.tcx", b"tcx");

    let mut owners = MockOwners::new();
    owners.expect_find_owner().returning(|_| Ok(None));

    let outcome = processor(owners, MockCategories::new(), MockImport::new())
        .process(&path)
        .await;

    assert_errored(&outcome, "unknownuser", "owner not found");
}

#[tokio::test]
async fn test_process_missing_category() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "bob/3/ride.fit", b"fit");

    let mut categories = MockCategories::new();
    categories
        .expect_find_category()
        .with(eq(3))
        .returning(|_| Ok(None));

    let outcome = processor(known_owner("bob", false), categories, MockImport::new())
        .process(&path)
        .await;

    assert_errored(&outcome, "bob", "category 3 not found");
}

#[tokio::test]
async fn test_process_suspended_owner_is_not_imported() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "carol/run.gpx", b"gpx");

    // MockImport without expectations panics if called
    let outcome = processor(known_owner("carol", true), known_category(1), MockImport::new())
        .process(&path)
        .await;

    assert_errored(&outcome, "carol", "owner suspended");
}

#[tokio::test]
async fn test_process_lookup_backend_failure_is_unexpected() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "alice/run.gpx", b"gpx");

    let mut owners = MockOwners::new();
    owners
        .expect_find_owner()
        .returning(|_| Err(DirectoryError::Unavailable("store offline".to_string())));

    let outcome = processor(owners, MockCategories::new(), MockImport::new())
        .process(&path)
        .await;

    match outcome {
        ResolutionOutcome::Errored { error, .. } => {
            assert!(matches!(error, ResolutionError::Unexpected(_)));
            assert!(error.is_severe());
        }
        other => panic!("expected Errored, got {:?}", other),
    }
}

// ============================================
// Address Failures
// ============================================

#[tokio::test]
async fn test_process_path_outside_root() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("elsewhere/alice/run.gpx");

    let outcome = processor(MockOwners::new(), MockCategories::new(), MockImport::new())
        .process(&path)
        .await;

    assert_errored(&outcome, "unknown", "root marker");
}

#[tokio::test]
async fn test_process_file_directly_under_root() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "run.gpx", b"gpx");

    let outcome = processor(MockOwners::new(), MockCategories::new(), MockImport::new())
        .process(&path)
        .await;

    assert_errored(&outcome, "unknown", "insufficient path depth");
}

// ============================================
// Read and Import Failures
// ============================================

#[tokio::test]
async fn test_process_unreadable_file() {
    let dir = TempDir::new().unwrap();
    // Never written to disk
    let path = dir.path().join("sink/alice/ghost.gpx");

    let outcome = processor(known_owner("alice", false), known_category(1), MockImport::new())
        .process(&path)
        .await;

    match outcome {
        ResolutionOutcome::Errored { owner, error } => {
            assert_eq!(owner, "alice");
            assert!(matches!(error, ResolutionError::Read(_)));
        }
        other => panic!("expected Errored, got {:?}", other),
    }
}

#[tokio::test]
async fn test_process_import_rejection_reports_diagnostics() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "alice/broken.gpx", b"not gpx");

    let mut importer = MockImport::new();
    importer.expect_import_file().times(1).returning(|_| {
        let mut diagnostics = serde_json::Map::new();
        diagnostics.insert(
            "errored_workouts".to_string(),
            serde_json::json!({"broken.gpx": "no tracks found"}),
        );
        Ok(ImportOutcome::rejected(diagnostics))
    });
    importer.expect_rollback().times(0);

    let outcome = processor(known_owner("alice", false), known_category(1), importer)
        .process(&path)
        .await;

    assert_errored(&outcome, "alice", "no tracks found");
}

#[tokio::test]
async fn test_process_import_failure_rolls_back() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "alice/run.gpx", b"gpx");

    let mut importer = MockImport::new();
    importer.expect_import_file().times(1).returning(|_| {
        Err(ImportError::ApiError {
            status: 500,
            message: "database locked".to_string(),
        })
    });
    importer.expect_rollback().times(1).return_const(());

    let outcome = processor(known_owner("alice", false), known_category(1), importer)
        .process(&path)
        .await;

    match outcome {
        ResolutionOutcome::Errored { owner, error } => {
            assert_eq!(owner, "alice");
            assert!(matches!(error, ResolutionError::Unexpected(_)));
            assert!(error.to_string().contains("database locked"));
        }
        other => panic!("expected Errored, got {:?}", other),
    }
}

#[tokio::test]
async fn test_process_empty_outcome_without_diagnostics() {
    let dir = TempDir::new().unwrap();
    let path = drop_file(&dir, "alice/run.gpx", b"gpx");

    let mut importer = MockImport::new();
    importer
        .expect_import_file()
        .returning(|_| Ok(ImportOutcome::default()));

    let outcome = processor(known_owner("alice", false), known_category(1), importer)
        .process(&path)
        .await;

    assert_errored(&outcome, "alice", "import produced no records");
}
