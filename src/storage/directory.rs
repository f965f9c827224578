use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::Config;
use crate::models::internal::{Category, Owner};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Lookup backend unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid lookup key: {0}")]
    InvalidKey(String),
}

// ============================================
// TRAIT DEFINITIONS - with Send + Sync bounds
// ============================================
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn find_owner(&self, name: &str) -> Result<Option<Owner>, DirectoryError>;
}

#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    async fn find_category(&self, id: i64) -> Result<Option<Category>, DirectoryError>;
}

// ============================================
// CONFIG-BACKED IMPLEMENTATION
// ============================================
/// Owner and category lookup over fixed lists, typically taken from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    owners: HashMap<String, Owner>,
    categories: HashMap<i64, Category>,
}

impl StaticDirectory {
    pub fn new(owners: Vec<Owner>, categories: Vec<Category>) -> Self {
        Self {
            owners: owners
                .into_iter()
                .map(|owner| (owner.name.clone(), owner))
                .collect(),
            categories: categories
                .into_iter()
                .map(|category| (category.id, category))
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.owners.clone(), config.categories.clone())
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

#[async_trait]
impl OwnerDirectory for StaticDirectory {
    async fn find_owner(&self, name: &str) -> Result<Option<Owner>, DirectoryError> {
        if name.is_empty() {
            return Err(DirectoryError::InvalidKey("empty owner name".to_string()));
        }
        Ok(self.owners.get(name).cloned())
    }
}

#[async_trait]
impl CategoryDirectory for StaticDirectory {
    async fn find_category(&self, id: i64) -> Result<Option<Category>, DirectoryError> {
        Ok(self.categories.get(&id).cloned())
    }
}
