use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::internal::{ImportOutcome, ImportRequest, ImportedRecord};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Collaborator that parses an activity file and persists its records.
///
/// Expected validation failures come back as an [`ImportOutcome`] with no
/// records; `Err` is reserved for unexpected conditions, after which the
/// caller invokes [`Importer::rollback`].
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import_file(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError>;

    /// Discards any transactional state left open by a failed import.
    async fn rollback(&self) {}
}

/// [`Importer`] backed by a remote import service.
#[derive(Clone)]
pub struct HttpImporter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpImporter {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub async fn health_check(&self) -> Result<bool, ImportError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

/// Hex encoded SHA-256 of the file content, sent as the idempotency key.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl Importer for HttpImporter {
    async fn import_file(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError> {
        let metadata = ImportMetadata {
            owner: request.owner.name.clone(),
            category_id: request.category.id,
            note: request.note.clone(),
        };
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| ImportError::InvalidResponse(e.to_string()))?;

        let bytes = request.upload.read_all().to_vec();
        let digest = content_digest(&bytes);
        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes).file_name(request.upload.filename().to_string()),
            )
            .text("data", metadata);

        let mut builder = self
            .client
            .post(format!("{}/imports", self.base_url))
            .header("Idempotency-Key", digest)
            .multipart(form);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ImportOutcome::rejected(rejection_diagnostics(&body)));
        }

        if !status.is_success() {
            return Err(ImportError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: ImportResponse = response
            .json()
            .await
            .map_err(|e| ImportError::InvalidResponse(e.to_string()))?;

        Ok(ImportOutcome {
            records: body.records,
            diagnostics: body.errors,
        })
    }
}

/// Diagnostics for a 4xx reply: the `errors` object when present, otherwise
/// the whole body.
fn rejection_diagnostics(body: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(mut map)) => match map.remove("errors") {
            Some(serde_json::Value::Object(errors)) => errors,
            Some(other) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert("errors".to_string(), other);
                wrapped
            }
            None => map,
        },
        _ => {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(
                "message".to_string(),
                serde_json::Value::String(body.to_string()),
            );
            wrapped
        }
    }
}

// Request/Response Models
#[derive(Serialize)]
struct ImportMetadata {
    owner: String,
    category_id: i64,
    note: String,
}

#[derive(Deserialize)]
struct ImportResponse {
    #[serde(default)]
    records: Vec<ImportedRecord>,
    #[serde(default)]
    errors: serde_json::Map<String, serde_json::Value>,
}
