pub mod address;
pub mod file_processor;
pub mod file_watcher;
pub mod import_client;
pub mod outcome_router;

// Re-export for convenience
pub use address::{AddressError, AddressParser};
pub use file_processor::{FileProcessor, ResolutionError};
pub use file_watcher::{resolve_file, SettlePolicy, SinkWatcher, WatcherError, WatcherState};
pub use import_client::{HttpImporter, ImportError, Importer};
pub use outcome_router::OutcomeRouter;
