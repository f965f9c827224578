use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::services::file_processor::ResolutionError;

/// Owner name used when no owner segment can be recovered from a path.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Owner and category encoded in a drop path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub owner: String,
    pub category_id: i64,
}

/// A file discovered by a creation event or by the recovery sweep.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub extension: String,
    pub discovered_at: DateTime<Utc>,
}

impl CandidateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self {
            path,
            extension,
            discovered_at: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    #[serde(default)]
    pub suspended: bool,
}

impl Owner {
    pub fn is_eligible(&self) -> bool {
        !self.suspended
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub label: String,
}

/// Summary of one record created by the import collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedRecord {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// Verdict of the import collaborator for expected outcomes.
///
/// Validation failures are reported as zero `records` plus a non-empty
/// `diagnostics` payload rather than as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    #[serde(default)]
    pub records: Vec<ImportedRecord>,
    #[serde(default, alias = "errors")]
    pub diagnostics: serde_json::Map<String, serde_json::Value>,
}

impl ImportOutcome {
    pub fn created(records: Vec<ImportedRecord>) -> Self {
        Self {
            records,
            diagnostics: serde_json::Map::new(),
        }
    }

    pub fn rejected(diagnostics: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            records: Vec::new(),
            diagnostics,
        }
    }

    /// Human readable form of the diagnostics payload.
    pub fn diagnostics_message(&self) -> String {
        if self.diagnostics.is_empty() {
            return "import produced no records".to_string();
        }
        serde_json::Value::Object(self.diagnostics.clone()).to_string()
    }
}

/// In-memory byte source handed to the import collaborator.
#[derive(Debug, Clone)]
pub struct FileUpload {
    filename: String,
    bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn read_all(&self) -> &[u8] {
        &self.bytes
    }

    pub async fn save_to(&self, dst: &Path) -> std::io::Result<()> {
        tokio::fs::write(dst, &self.bytes).await
    }
}

/// Everything the import collaborator needs for one file.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub owner: Owner,
    pub category: Category,
    pub upload: FileUpload,
    pub note: String,
}

/// Terminal verdict for one candidate file.
#[derive(Debug)]
pub enum ResolutionOutcome {
    Processed {
        owner: String,
        record: ImportedRecord,
    },
    Errored {
        owner: String,
        error: ResolutionError,
    },
}

impl ResolutionOutcome {
    pub fn owner(&self) -> &str {
        match self {
            ResolutionOutcome::Processed { owner, .. } => owner,
            ResolutionOutcome::Errored { owner, .. } => owner,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, ResolutionOutcome::Processed { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            ResolutionOutcome::Processed { .. } => None,
            ResolutionOutcome::Errored { error, .. } => Some(error.to_string()),
        }
    }
}
