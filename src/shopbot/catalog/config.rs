use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::shopbot::catalog::error::{CatalogError, Result};

/// Tunables shared by the converter and the asset scanner.
///
/// Every field has a default, so an empty JSON object (or no file at all) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Delimiter placed between category levels.
    pub category_separator: String,
    /// Largest number of `;`-separated amounts a price may carry.
    pub max_price_segments: usize,
    /// File extensions, without the dot, treated as product images.
    pub image_extensions: Vec<String>,
    /// Name of the description file inside an asset folder.
    pub description_file: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            category_separator: "/".to_string(),
            max_price_segments: 2,
            image_extensions: ["jpg", "jpeg", "png", "gif", "bmp", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            description_file: "description.txt".to_string(),
        }
    }
}

impl ImportConfig {
    /// Reads a JSON configuration file and validates it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CatalogError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let config: ImportConfig = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "configuration loaded");
        Ok(config)
    }

    /// Loads the file when one is given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.category_separator.is_empty() {
            return Err(CatalogError::InvalidConfig(
                "category_separator must not be empty".into(),
            ));
        }
        if self.max_price_segments == 0 {
            return Err(CatalogError::InvalidConfig(
                "max_price_segments must be at least 1".into(),
            ));
        }
        if self.description_file.trim().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "description_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether the file name carries one of the configured image extensions.
    pub fn is_image(&self, file_name: &str) -> bool {
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.image_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}
