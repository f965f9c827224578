// tests/integration/mod.rs

// ============================================
// Re-export commonly used types
// ============================================
pub use serde_json::json;
pub use std::sync::Arc;

use activity_sink::{
    config::Config,
    models::internal::{Category, ImportOutcome, ImportRequest, ImportedRecord, Owner},
    services::{
        import_client::{ImportError, Importer},
        FileProcessor, SinkWatcher,
    },
    storage::StaticDirectory,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;


// ============================================
// Shared Test Helpers
// ============================================

/// Importer double: creates one record per file unless the filename
/// contains `reject`.
#[derive(Default)]
pub struct RecordingImporter {
    calls: Mutex<Vec<(String, String, i64)>>,
}

impl RecordingImporter {
    /// (owner, filename, category) for every import call, in order.
    pub fn calls(&self) -> Vec<(String, String, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Importer for RecordingImporter {
    async fn import_file(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError> {
        let filename = request.upload.filename().to_string();
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((
                request.owner.name.clone(),
                filename.clone(),
                request.category.id,
            ));
            calls.len()
        };

        if filename.contains("reject") {
            let mut diagnostics = serde_json::Map::new();
            diagnostics.insert(filename, json!("unsupported file content"));
            return Ok(ImportOutcome::rejected(diagnostics));
        }

        Ok(ImportOutcome::created(vec![ImportedRecord {
            id: format!("w{}", index),
            label: "Imported activity".to_string(),
        }]))
    }
}

pub fn create_test_config(root: &Path) -> Config {
    Config {
        watch_root: root.to_path_buf(),
        settle_delay_ms: 10,
        settle_max_polls: 5,
        owners: vec![
            Owner {
                name: "alice".to_string(),
                suspended: false,
            },
            Owner {
                name: "bob".to_string(),
                suspended: false,
            },
            Owner {
                name: "carol".to_string(),
                suspended: true,
            },
        ],
        categories: vec![
            Category {
                id: 1,
                label: "Cycling (Sport)".to_string(),
            },
            Category {
                id: 2,
                label: "Cycling (Transport)".to_string(),
            },
        ],
        ..Config::default()
    }
}

pub fn create_test_watcher(root: &Path) -> (SinkWatcher, Arc<RecordingImporter>) {
    let config = Arc::new(create_test_config(root));
    let directory = Arc::new(StaticDirectory::from_config(&config));
    let importer = Arc::new(RecordingImporter::default());
    let processor = Arc::new(FileProcessor::from_config(
        &config,
        directory.clone(),
        directory,
        importer.clone(),
    ));
    (SinkWatcher::new(config, processor), importer)
}

pub fn drop_file(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
