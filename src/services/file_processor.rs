use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::internal::{
    Category, FileUpload, ImportRequest, Owner, ParsedAddress, ResolutionOutcome,
};
use crate::services::address::{AddressError, AddressParser};
use crate::services::import_client::Importer;
use crate::storage::directory::{CategoryDirectory, OwnerDirectory};

/// Reasons a candidate file ends up in `error/`. None are retried.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("owner not found")]
    OwnerNotFound,
    #[error("category {0} not found")]
    CategoryNotFound(i64),
    #[error("owner suspended")]
    OwnerSuspended,
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("{0}")]
    Import(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ResolutionError {
    /// Failures that point at the environment rather than at the dropped file.
    pub fn is_severe(&self) -> bool {
        matches!(self, ResolutionError::Read(_) | ResolutionError::Unexpected(_))
    }
}

/// Resolves one candidate file to a [`ResolutionOutcome`]. Holds no state
/// between calls and never moves the file itself.
#[derive(Clone)]
pub struct FileProcessor {
    parser: AddressParser,
    owners: Arc<dyn OwnerDirectory>,
    categories: Arc<dyn CategoryDirectory>,
    importer: Arc<dyn Importer>,
    note: String,
}

impl FileProcessor {
    pub fn new(
        parser: AddressParser,
        owners: Arc<dyn OwnerDirectory>,
        categories: Arc<dyn CategoryDirectory>,
        importer: Arc<dyn Importer>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            parser,
            owners,
            categories,
            importer,
            note: note.into(),
        }
    }

    pub fn from_config(
        config: &Config,
        owners: Arc<dyn OwnerDirectory>,
        categories: Arc<dyn CategoryDirectory>,
        importer: Arc<dyn Importer>,
    ) -> Self {
        Self::new(
            AddressParser::new(config.root_marker(), config.default_category_id),
            owners,
            categories,
            importer,
            config.import_note.clone(),
        )
    }

    pub fn parser(&self) -> &AddressParser {
        &self.parser
    }

    pub async fn process(&self, path: &Path) -> ResolutionOutcome {
        info!("Processing file: {}", path.display());

        let address = match self.parser.parse(path) {
            Ok(address) => address,
            Err(e) => return self.errored(self.parser.owner_hint(path), e.into()),
        };
        let owner_name = address.owner.clone();

        match self.resolve(path, address).await {
            Ok(outcome) => outcome,
            Err(e) => self.errored(owner_name, e),
        }
    }

    async fn resolve(
        &self,
        path: &Path,
        address: ParsedAddress,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        let owner = self.lookup_owner(&address.owner).await?;
        let category = self.lookup_category(address.category_id).await?;

        if !owner.is_eligible() {
            return Err(ResolutionError::OwnerSuspended);
        }

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let request = ImportRequest {
            owner: owner.clone(),
            category: category.clone(),
            upload: FileUpload::new(filename, bytes),
            note: self.note.clone(),
        };

        let outcome = match self.importer.import_file(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.importer.rollback().await;
                return Err(ResolutionError::Unexpected(e.to_string()));
            }
        };

        let message = outcome.diagnostics_message();
        match outcome.records.into_iter().next() {
            Some(record) => {
                info!(
                    "Successfully imported record for owner {}: {} ({})",
                    owner.name, record.id, category.label
                );
                Ok(ResolutionOutcome::Processed {
                    owner: owner.name,
                    record,
                })
            }
            None => Err(ResolutionError::Import(message)),
        }
    }

    async fn lookup_owner(&self, name: &str) -> Result<Owner, ResolutionError> {
        self.owners
            .find_owner(name)
            .await
            .map_err(|e| ResolutionError::Unexpected(e.to_string()))?
            .ok_or(ResolutionError::OwnerNotFound)
    }

    async fn lookup_category(&self, id: i64) -> Result<Category, ResolutionError> {
        self.categories
            .find_category(id)
            .await
            .map_err(|e| ResolutionError::Unexpected(e.to_string()))?
            .ok_or(ResolutionError::CategoryNotFound(id))
    }

    fn errored(&self, owner: String, error: ResolutionError) -> ResolutionOutcome {
        if error.is_severe() {
            error!("Failed to resolve file for owner {}: {}", owner, error);
        } else {
            warn!("Rejected file for owner {}: {}", owner, error);
        }
        ResolutionOutcome::Errored { owner, error }
    }
}
