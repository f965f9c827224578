use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::models::internal::{Category, Owner};

/// Reserved child of the watch root receiving successfully imported files.
pub const PROCESSED_DIR: &str = "processed";
/// Reserved child of the watch root receiving failed files and their sidecars.
pub const ERROR_DIR: &str = "error";

pub const DEFAULT_CATEGORY_ID: i64 = 1;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = ["fit", "gpx", "kml", "kmz", "tcx"];
pub const DEFAULT_IMPORT_NOTE: &str = "Imported from sink folder";

/// Main configuration for the sink folder service
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// Directory watched for dropped activity files
    pub watch_root: PathBuf,

    /// Recognised activity file extensions (case-insensitive, no leading dot)
    #[validate(length(min = 1))]
    pub allowed_extensions: Vec<String>,

    /// Category used when the drop path does not name one
    #[validate(range(min = 1))]
    pub default_category_id: i64,

    /// Delay before a freshly created file is read, and between size samples
    #[validate(range(max = 60000))]
    pub settle_delay_ms: u64,

    /// Upper bound on size samples taken while waiting for a file to settle
    #[validate(range(min = 1, max = 1000))]
    pub settle_max_polls: u32,

    /// Note attached to every imported record
    pub import_note: String,

    /// Base URL of the import service
    #[validate(url)]
    pub importer_url: String,

    /// Optional bearer token for the import service
    pub importer_token: Option<String>,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Known owners and their eligibility
    #[serde(default)]
    pub owners: Vec<Owner>,

    /// Known categories
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: default_watch_root(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            default_category_id: DEFAULT_CATEGORY_ID,
            settle_delay_ms: 500,
            settle_max_polls: 10,
            import_note: DEFAULT_IMPORT_NOTE.to_string(),
            importer_url: "http://localhost:5000".to_string(),
            importer_token: None,
            log_level: "info".to_string(),
            owners: Vec::new(),
            categories: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Config::default();
        let settings = config::Config::builder()
            .set_default("watch_root", defaults.watch_root.to_string_lossy().into_owned())?
            .set_default("allowed_extensions", defaults.allowed_extensions.clone())?
            .set_default("default_category_id", defaults.default_category_id)?
            .set_default("settle_delay_ms", defaults.settle_delay_ms)?
            .set_default("settle_max_polls", defaults.settle_max_polls)?
            .set_default("import_note", defaults.import_note.as_str())?
            .set_default("importer_url", defaults.importer_url.as_str())?
            .set_default("log_level", defaults.log_level.as_str())?
            // Load from ~/.activity-sink/config.toml (if present)
            .add_source(
                config::File::with_name(&format!(
                    "{}/.activity-sink/config",
                    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
                ))
                .required(false),
            )
            // Environment overrides: ACTIVITY_SINK__WATCH_ROOT, ACTIVITY_SINK__IMPORTER_URL, etc.
            .add_source(
                config::Environment::with_prefix("ACTIVITY_SINK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allowed_extensions")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Name of the watch root directory, used to locate it inside drop paths.
    pub fn root_marker(&self) -> String {
        self.watch_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.watch_root.join(PROCESSED_DIR)
    }

    pub fn error_dir(&self) -> PathBuf {
        self.watch_root.join(ERROR_DIR)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn is_allowed_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = ext.to_string_lossy();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

fn default_watch_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".activity-sink")
        .join("sink")
}
