//! Model catalog loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use taskforge_abstraction::LlmConfig;
use thiserror::Error;
use tracing::info;

/// Errors while loading a catalog file.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One model available for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name; metrics are keyed by `config.model_path`.
    pub name: String,
    #[serde(flatten)]
    pub config: LlmConfig,
}

/// Ordered list of models the router scores.
///
/// Order matters: score ties are broken by catalog order, first entry wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "models")]
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Loads a catalog from a TOML file with `[[models]]` tables.
    ///
    /// # Errors
    /// `CatalogError::Io` or `CatalogError::Parse`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_toml_str(&contents)?;
        info!(
            path = %path.as_ref().display(),
            models = catalog.entries.len(),
            "Loaded model catalog"
        );
        Ok(catalog)
    }

    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    /// `CatalogError::Parse`.
    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
