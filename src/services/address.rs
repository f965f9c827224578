//! Owner and category addressing encoded in drop paths.
//!
//! Accepted shapes below the watch root:
//!
//! ```text
//! {root}/{owner}/{file}              -> default category
//! {root}/{owner}/{category_id}/{file}
//! ```

use std::path::{Component, Path};

use crate::models::internal::{ParsedAddress, UNKNOWN_OWNER};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("root marker '{0}' not found in path")]
    RootMarkerNotFound(String),
    #[error("insufficient path depth: expected {0}/owner/file or {0}/owner/category/file")]
    InsufficientDepth(String),
}

#[derive(Debug, Clone)]
pub struct AddressParser {
    marker: String,
    default_category_id: i64,
}

impl AddressParser {
    pub fn new(marker: impl Into<String>, default_category_id: i64) -> Self {
        Self {
            marker: marker.into(),
            default_category_id,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn default_category_id(&self) -> i64 {
        self.default_category_id
    }

    pub fn parse(&self, path: &Path) -> Result<ParsedAddress, AddressError> {
        let remaining = self.segments_after_marker(path)?;

        if remaining.len() < 2 {
            return Err(AddressError::InsufficientDepth(self.marker.clone()));
        }

        let owner = remaining[0].clone();
        let category_id = match remaining.len() {
            // A non-numeric middle folder is tolerated as a stray directory.
            3 => remaining[1]
                .parse::<i64>()
                .unwrap_or(self.default_category_id),
            // Two segments use the default; deeper nesting ignores the extras.
            _ => self.default_category_id,
        };

        Ok(ParsedAddress { owner, category_id })
    }

    /// Best-effort owner segment for routing files whose address did not parse.
    pub fn owner_hint(&self, path: &Path) -> String {
        match self.segments_after_marker(path) {
            Ok(remaining) if remaining.len() >= 2 => remaining[0].clone(),
            _ => UNKNOWN_OWNER.to_string(),
        }
    }

    fn segments_after_marker(&self, path: &Path) -> Result<Vec<String>, AddressError> {
        let segments: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let marker_index = segments
            .iter()
            .position(|segment| *segment == self.marker)
            .ok_or_else(|| AddressError::RootMarkerNotFound(self.marker.clone()))?;

        Ok(segments[marker_index + 1..].to_vec())
    }
}
