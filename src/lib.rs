//! Activity Sink - folder-based ingestion of activity files

pub mod config;
pub mod models;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::config::Config;
pub use crate::models::internal::{CandidateFile, ResolutionOutcome};
pub use crate::services::{
    FileProcessor, HttpImporter, Importer, OutcomeRouter, SinkWatcher, WatcherState,
};
pub use crate::storage::StaticDirectory;
